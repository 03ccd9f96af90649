//! Runboard: indexes test executions from CI folders and keeps problems
//! in sync with the defect tracker they link to.

pub mod assemble;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod defect;
pub mod model;
pub mod scan;
pub mod services;
pub mod storage;

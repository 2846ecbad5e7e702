use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobPreset {
    /// Every preset below, in order
    All,
    /// Per-profile auxiliary files from the directory listing
    AuxProfiles,
    /// Auxiliary trajectory file of each float
    AuxTraj,
    /// Core trajectory file of each float
    CoreTraj,
    /// The bio-profile index file
    Index,
}

#[derive(Parser, Debug)]
#[command(name = "argo-mirror")]
#[command(author, version, about = "Mirror Argo float files into a local directory tree", long_about = None)]
pub struct Args {
    /// Built-in job to run
    #[arg(short, long, value_enum, default_value = "all")]
    pub job: JobPreset,

    /// JSON file with job definitions; replaces the built-in jobs
    #[arg(short, long, conflicts_with = "job")]
    pub config: Option<PathBuf>,

    /// Download root, overriding the one of every job
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Station (WMO number) to mirror; repeat to mirror several
    #[arg(short, long = "station")]
    pub stations: Vec<String>,

    /// Per-request timeout in seconds (default: wait forever)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// HTTP proxy (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    pub proxy: Option<String>,
}

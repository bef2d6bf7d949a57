/*
Copyright (c) 2022 VMware, Inc.
SPDX-License-Identifier: MIT
Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:
The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.
THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

//! Compiles the INT intents of a scenario file and prints the resulting
//! clone groups and table entries.

use anyhow::{bail, Context, Result};

use clap::Parser;

use fabric_tna::backend::MemoryBackend;
use fabric_tna::config::Scenario;
use fabric_tna::context::DeviceContext;
use fabric_tna::int::IntProgrammable;
use fabric_tna::schema;

use p4ext::Switch;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, Level};

#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    /// Scenario file describing the device and its intents
    #[clap(long)]
    scenario: PathBuf,

    /// P4Info JSON to check entries against, instead of the built-in one
    #[clap(long)]
    p4info: Option<PathBuf>,

    /// Do not install the INT mirror topology
    #[clap(long)]
    skip_topology: bool,

    /// Log at debug level
    #[clap(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_max_level(level).init();

    let schema = match &args.p4info {
        Some(path) => {
            let switch = Switch::from_file(path)?;
            schema::check(&switch)
                .with_context(|| format!("{}: not a fabric-tna pipeline", path.display()))?;
            switch
        }
        None => schema::builtin()?,
    };

    let scenario_text = fs::read_to_string(&args.scenario)
        .with_context(|| format!("{}: could not read scenario", args.scenario.display()))?;
    let scenario = Scenario::from_json(&scenario_text)
        .with_context(|| format!("{}", args.scenario.display()))?;

    let statics = Arc::new(scenario.static_config());
    let backend = Arc::new(MemoryBackend::new());
    let ctx = DeviceContext::new(
        scenario.device_id.clone(),
        scenario.capabilities,
        statics.clone(),
        statics.clone(),
        statics,
        backend.clone(),
    );
    let int = IntProgrammable::new(ctx, Arc::new(schema))?;

    if !args.skip_topology && !int.init() {
        bail!("{}: INT topology install failed", scenario.device_id);
    }
    if let Some(config) = &scenario.int_config {
        if !int.setup_int_config(config) {
            bail!("{}: INT config setup failed", scenario.device_id);
        }
    }
    for (i, objective) in scenario.int_objectives.iter().enumerate() {
        if !int.add_int_objective(objective) {
            bail!("{}: INT objective {} failed", scenario.device_id, i);
        }
    }

    let groups = backend.groups(&scenario.device_id);
    let entries = backend.entries(&scenario.device_id);
    for group in &groups {
        println!("{}", group);
    }
    for entry in &entries {
        println!("{}", entry);
    }
    info!("{}: {} groups, {} entries", scenario.device_id, groups.len(), entries.len());
    Ok(())
}

//! `kmodctl facts` and `kmodctl probe`

use anyhow::Result;
use kmod::{Collaborators, HostProfile, Mechanism, ModuleName, StateProbe};
use serde::Serialize;

use crate::Context;
use crate::cli::FactsArgs;
use crate::ui;

#[derive(Serialize)]
struct FactsReport {
    #[serde(flatten)]
    profile: HostProfile,
    mechanism: Option<Mechanism>,
}

pub fn run(ctx: &Context, args: FactsArgs) -> Result<bool> {
    let config = super::load_config(ctx)?;
    let profile = super::host_profile(&config)?;
    let mechanism = kmod::select(&profile);

    if args.json {
        let report = FactsReport {
            profile,
            mechanism: mechanism.as_ref().ok().copied(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(true);
    }

    ui::header("Host");
    ui::kv("init system", &profile.init_system.to_string());
    ui::kv("family", &profile.family.to_string());
    ui::kv(
        "facts",
        if config.host.is_some() {
            "from configuration"
        } else {
            "detected"
        },
    );

    ui::header("Persistence");
    match mechanism {
        Ok(mechanism) => ui::kv("mechanism", &mechanism.to_string()),
        Err(e) => {
            ui::kv("mechanism", "none");
            ui::warn(&e.to_string());
        }
    }
    Ok(true)
}

/// Returns whether the module is loaded
pub fn probe(ctx: &Context, name: &str) -> Result<bool> {
    let name = ModuleName::parse(name)?;
    let probe = StateProbe::new(Collaborators::system().modules);
    let loaded = probe.is_loaded(&name)?;

    if !ctx.quiet {
        if loaded {
            ui::success(&format!("{name} is loaded"));
        } else {
            ui::dim(&format!("{name} is not loaded"));
        }
    }
    Ok(loaded)
}

use anyhow::{Context, Result};
use clap::Parser;
use entrando::overrides::write_overrides;
use entrando::settings::{parse_shuffle_settings, ShuffleSettings};
use entrando::shuffle::generate;
use entrando::spoiler_log::get_spoiler_log;
use entrando::tracking::get_entrance_tracking_data;
use entrando_game::GameData;
use log::info;
use rand::{RngCore, SeedableRng};
use std::path::PathBuf;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    world: PathBuf,

    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long)]
    random_seed: Option<usize>,

    #[arg(long)]
    max_attempts: Option<usize>,

    #[arg(long)]
    output_overrides: Option<PathBuf>,

    #[arg(long)]
    output_spoiler_log: Option<PathBuf>,

    #[arg(long)]
    output_tracking: Option<PathBuf>,
}

fn load_settings(args: &Args) -> Result<ShuffleSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let settings_str = std::fs::read_to_string(path)
                .with_context(|| format!("Unable to read settings at {}", path.display()))?;
            parse_shuffle_settings(&settings_str)
                .with_context(|| format!("Unable to parse settings at {}", path.display()))?
        }
        None => ShuffleSettings::default(),
    };
    if let Some(max_attempts) = args.max_attempts {
        settings.max_shuffle_attempts = max_attempts.max(1);
    }
    Ok(settings)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let game_data = GameData::load(&args.world)?;
    let settings = load_settings(&args)?;
    if let Some(name) = &settings.name {
        info!("Settings: {name}");
    }
    info!("Enabled entrance types: {:?}", settings.enabled_types());

    let root_seed = match args.random_seed {
        Some(s) => s,
        None => (rand::rngs::StdRng::from_entropy().next_u64() & 0xFFFFFFFF) as usize,
    };
    let result = generate(&game_data, &settings, root_seed)?;
    info!(
        "Shuffled {} entrances on attempt {} (seed={})",
        result.overrides.len(),
        result.attempt_num,
        result.seed
    );

    // Save the outputs:
    if let Some(output_overrides_path) = &args.output_overrides {
        println!(
            "Writing entrance overrides to {}",
            output_overrides_path.display()
        );
        std::fs::write(output_overrides_path, write_overrides(&result.overrides))?;
    }

    if let Some(output_spoiler_log_path) = &args.output_spoiler_log {
        println!(
            "Writing spoiler log to {}",
            output_spoiler_log_path.display()
        );
        let spoiler_log = get_spoiler_log(&result, &settings);
        let spoiler_str = serde_json::to_string_pretty(&spoiler_log)?;
        std::fs::write(output_spoiler_log_path, spoiler_str)?;
    }

    if let Some(output_tracking_path) = &args.output_tracking {
        println!("Writing tracking data to {}", output_tracking_path.display());
        let tracking = get_entrance_tracking_data(&game_data.entrance_table, &result.overrides);
        std::fs::write(output_tracking_path, serde_json::to_string_pretty(&tracking)?)?;
    }

    Ok(())
}

use std::error::Error;
use std::path::PathBuf;
use std::process;

use log::{error, info};
use quotient_db::setup_logging::setup_logging;
use quotient_db::{ConfigSettings, Db};
use structopt::StructOpt;

#[derive(StructOpt)]
struct Opt {
    #[structopt(subcommand)]
    cmd: Command,

    #[structopt(long = "config", parse(from_os_str))]
    config: PathBuf,
}

#[derive(StructOpt)]
enum Command {
    /// Creates the configured boxes and teams, plus directory teams if configured
    #[structopt(name = "setup")]
    Setup,

    /// Prints every box as JSON
    #[structopt(name = "boxes")]
    Boxes,

    /// Sets or clears the hostname of the box with the given IP
    #[structopt(name = "set-hostname")]
    SetHostname { ip: String, hostname: Option<String> },

    /// Deletes every round, service check and SLA penalty
    #[structopt(name = "reset-scores")]
    ResetScores,
}

fn main() {
    setup_logging();
    let opt = Opt::from_args();

    let config = ConfigSettings::from_file(&opt.config).expect("couldn't load config");

    // no retries: without a migrated database there is nothing to do
    let db = match Db::connect_to(&config.database.target()) {
        Ok(db) => db,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    if let Err(err) = run(&opt.cmd, &config, &db) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(cmd: &Command, config: &ConfigSettings, db: &Db) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Setup => {
            db.load_boxes(&config.boxes)?;
            let created = db.add_teams(config)?;
            info!("setup complete, {} new team(s)", created);
        }
        Command::Boxes => {
            let boxes = db.get_boxes()?;
            println!("{}", serde_json::to_string_pretty(&boxes)?);
        }
        Command::SetHostname { ip, hostname } => {
            let mut scored_box = db
                .get_box_by_ip(ip)?
                .ok_or_else(|| format!("no box with ip {}", ip))?;
            scored_box.hostname = hostname.clone();
            let saved = db.update_box(scored_box)?;
            info!("box {} hostname is now {:?}", saved.ip, saved.hostname);
        }
        Command::ResetScores => db.reset_scores()?,
    }
    Ok(())
}

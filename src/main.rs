use clap::{Arg, Command};
use log::LevelFilter;
use spamsweep::config::Config;
use spamsweep::coordinator::run_all;
use spamsweep::mailbox::MemoryMailbox;
use spamsweep::report::LogReporter;
use std::process;

fn main() {
    let matches = Command::new("spamsweep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Blacklist/whitelist driven spam sweeper for remote mailboxes")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/spamsweep.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a sample configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Run in demonstration mode against an in-memory mailbox")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        let config = Config::default();
        match config.to_file(generate_path) {
            Ok(()) => {
                println!("Sample configuration written to: {generate_path}");
                process::exit(0);
            }
            Err(e) => {
                eprintln!("Failed to write configuration: {e}");
                process::exit(1);
            }
        }
    }

    if matches.get_flag("demo") {
        if let Err(e) = run_demo() {
            eprintln!("Demo run failed: {e}");
            process::exit(1);
        }
        return;
    }

    // Without a mode flag the binary validates the configuration; real
    // mailbox transports are provided by applications embedding the
    // library.
    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Cannot load configuration {config_path}: {e}");
            process::exit(1);
        }
    };

    let problems = config.validate();
    if problems.is_empty() {
        println!(
            "Configuration valid: {} account(s) configured",
            config.accounts.len()
        );
    } else {
        for problem in &problems {
            eprintln!("{problem}");
        }
        if matches.get_flag("test-config") {
            process::exit(1);
        }
    }
}

/// Sweep a seeded in-memory mailbox end to end and print the report.
fn run_demo() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join("spamsweep-demo");
    std::fs::create_dir_all(&dir)?;
    let blacklist = dir.join("blacklist.txt");
    let whitelist = dir.join("whitelist.txt");
    std::fs::write(&blacklist, "evil.com")?;
    std::fs::write(&whitelist, "boss@work.example")?;

    let mailbox = MemoryMailbox::new();
    mailbox.add_folder("INBOX");
    mailbox.add_message(
        "Spam",
        1,
        b"Received: from relay.evil.com ([203.0.113.9])\r\n\
\tby mx.example.org with ESMTP; Mon, 23 Oct 2023 10:00:00 +0000\r\n\
From: Deals <deals@evil.com>\r\nSubject: Cheap pills\r\n\r\nbuy now\r\n",
    );
    mailbox.add_message(
        "Spam",
        2,
        b"From: The Boss <boss@work.example>\r\nSubject: Misfiled report\r\n\r\nsee attached\r\n",
    );
    mailbox.add_message(
        "Blacklist",
        3,
        b"Received: from scam.example ([198.51.100.7])\r\n\
\tby mx.example.org with ESMTP; Mon, 23 Oct 2023 10:00:00 +0000\r\n\
From: Crook <crook@scam.example>\r\nSubject: Confirmed spam sample\r\n\r\nspam\r\n",
    );

    let config = Config {
        defaults: spamsweep::config::ListDefaults {
            blacklist: Some(blacklist.clone()),
            whitelist: Some(whitelist),
        },
        accounts: vec![spamsweep::config::AccountConfig {
            name: "demo".to_string(),
            host: Some("memory".to_string()),
            username: Some("demo".to_string()),
            password: Some("demo".to_string()),
            folder: Some("Spam, Blacklist".to_string()),
            inbox: Some("INBOX".to_string()),
            blacklist: None,
            whitelist: None,
        }],
    };

    let reporter = LogReporter;
    let report = run_all(&config, &mailbox, &reporter);

    println!(
        "Demo complete: {} moved, {} deleted",
        report.total_moved(),
        report.total_deleted()
    );
    for result in &report.accounts {
        println!(
            "  {}: whitelist {:?}, blacklist {:?}",
            result.account, result.whitelist, result.blacklist
        );
    }
    for (account, pass, reason) in report.failures() {
        println!("  failure: {account} ({pass} pass): {reason}");
    }
    println!("Blacklist after run: {}", std::fs::read_to_string(&blacklist)?);
    Ok(())
}

use std::error::Error;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use prettytable::{Cell, Row, Table};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use relbase::{ConfigError, Engine, EngineConfig, Frontend, Output};

#[derive(Parser, Debug)]
#[command(name = "relbase", version, about = "A block-based relational storage engine")]
struct Args {
    /// Disk file to use
    #[arg(long)]
    disk: Option<PathBuf>,

    /// JSON settings file; command-line options override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of frames in the buffer pool
    #[arg(long)]
    buffer_capacity: Option<usize>,

    /// Maximum number of open relations, catalogs included
    #[arg(long)]
    max_open: Option<usize>,

    /// Format a fresh disk, discarding any existing one
    #[arg(long)]
    format: bool,

    /// Run the commands in this file, one per line, instead of prompting
    script: Option<PathBuf>,
}

impl Args {
    fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(disk) = &self.disk {
            config.disk_path = disk.clone();
        }
        if let Some(capacity) = self.buffer_capacity {
            config.buffer_capacity = capacity;
        }
        if let Some(max_open) = self.max_open {
            config.max_open = max_open;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_output(output: Output) {
    match output {
        Output::Done | Output::Exit => {}
        Output::Message(message) => println!("{}", message),
        Output::Table { columns, rows } => {
            let mut table = Table::new();
            table.add_row(Row::new(columns.iter().map(|c| Cell::new(c)).collect()));
            for row in &rows {
                table.add_row(Row::new(row.iter().map(|v| Cell::new(v)).collect()));
            }
            table.printstd();
            println!("{} records", rows.len());
        }
    }
}

/// Run one line; returns false once the session should end
fn run_line(frontend: &mut Frontend, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.starts_with("--") {
        return true;
    }
    match frontend.execute(line) {
        Ok(Output::Exit) => false,
        Ok(output) => {
            print_output(output);
            true
        }
        Err(err) => {
            println!("Error: {}", err);
            true
        }
    }
}

fn run_script(frontend: &mut Frontend, path: &Path) -> io::Result<()> {
    let content = fs::read_to_string(path)?;
    for line in content.lines() {
        if !run_line(frontend, line) {
            break;
        }
    }
    Ok(())
}

fn run_prompt(frontend: &mut Frontend) -> rustyline::Result<()> {
    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline("relbase > ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                if !run_line(frontend, &line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
            }
            Err(ReadlineError::Eof) => {
                println!("Exited");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = args.engine_config()?;

    let engine = if args.format {
        Engine::create(&config)?
    } else {
        Engine::open_or_create(&config)?
    };
    let mut frontend = Frontend::new(engine);

    match &args.script {
        Some(path) => run_script(&mut frontend, path)?,
        None => run_prompt(&mut frontend)?,
    }
    frontend.shutdown()?;
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recordkeeper::{ConnectionConfig, StatementBuilder, SynthesizedStatement, TableDescriptor};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recordkeeper")]
#[command(about = "Developer tooling for recordkeeper table descriptors")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every statement synthesized for a descriptor
    Sql {
        #[arg(long)]
        descriptor: PathBuf,
    },
    /// Check a descriptor file and summarize it
    Validate {
        #[arg(long)]
        descriptor: PathBuf,
    },
    /// Parse a connection URL and print the resulting settings
    ParseUrl { url: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Command::Sql { descriptor } => print_statements(&load(&descriptor)?),
        Command::Validate { descriptor } => validate(&descriptor),
        Command::ParseUrl { url } => parse_url(&url),
    }
}

fn load(path: &Path) -> Result<TableDescriptor> {
    debug!(path = %path.display(), "loading descriptor");
    TableDescriptor::from_json_file(path)
        .with_context(|| format!("failed to load descriptor {}", path.display()))
}

fn print_statements(descriptor: &TableDescriptor) -> Result<()> {
    let builder = StatementBuilder::new(descriptor);

    print_statement("select by key", &builder.build_select_by_key());
    print_statement("select all", &builder.build_select_all());
    print_statement("insert", &builder.build_insert());
    match builder.build_update() {
        Ok(statement) => print_statement("update", &statement),
        Err(err) => println!("-- update: not available ({})\n", err),
    }
    print_statement("delete", &builder.build_delete());
    Ok(())
}

fn print_statement(label: &str, statement: &SynthesizedStatement) {
    println!("-- {}", label);
    println!("{}", statement.sql);
    if !statement.parameters.is_empty() {
        println!(
            "-- parameters: {} ({})",
            statement.parameters.type_codes(),
            statement.parameters.columns().join(", ")
        );
    }
    println!();
}

fn validate(path: &Path) -> Result<()> {
    let descriptor = load(path)?;
    let key: Vec<&str> = descriptor.primary_key().iter().map(|c| c.name.as_str()).collect();

    println!("table:          {}", descriptor.table_name());
    println!("columns:        {}", descriptor.column_count());
    println!("primary key:    {}", key.join(", "));
    println!(
        "auto increment: {}",
        descriptor.auto_increment().unwrap_or("-")
    );
    println!("updatable:      {}", descriptor.non_key_columns().next().is_some());
    Ok(())
}

fn parse_url(url: &str) -> Result<()> {
    let config = ConnectionConfig::from_url(url).context("invalid connection URL")?;
    config.validate().context("incomplete connection settings")?;

    println!("driver:   {}", config.driver);
    println!("host:     {}", config.host);
    println!("port:     {}", config.port);
    println!("database: {}", config.database);
    println!("username: {}", config.username);
    println!("url:      {}", config.to_url());
    Ok(())
}

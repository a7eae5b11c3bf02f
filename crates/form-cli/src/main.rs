use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use form_spec::{
    EvalContext, FormSchema, ValidationResult, Values, check_schema, initial_values,
    recompute_detailed, recompute_with, validate,
};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const LOG_ENV: &str = "FORMCHECK_LOG";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form schema preview helper",
    long_about = "Recomputes derived fields, validates values and checks schema integrity for form schemas"
)]
struct Cli {
    /// Log engine diagnostics (convergence, degraded formulas) to stderr.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Recompute every derived field and print the resulting values.
    Recompute {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Optional JSON file with the current field values.
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        /// Date used for age calculations (YYYY-MM-DD, defaults to today).
        #[arg(long, value_name = "DATE")]
        today: Option<NaiveDate>,
    },
    /// Recompute, then validate the values against the schema rules.
    Validate {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Path to the values JSON file.
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
        /// Date used for age calculations (YYYY-MM-DD, defaults to today).
        #[arg(long, value_name = "DATE")]
        today: Option<NaiveDate>,
        /// Print the validation result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Report structural problems such as cycles or dangling parents.
    Check {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
    /// Print the values a fresh preview starts with.
    Preview {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Date used for age calculations (YYYY-MM-DD, defaults to today).
        #[arg(long, value_name = "DATE")]
        today: Option<NaiveDate>,
    },
    /// Print the JSON Schema describing the form schema format.
    Schema,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Command::Recompute {
            schema,
            values,
            today,
        } => run_recompute(&schema, values.as_deref(), today),
        Command::Validate {
            schema,
            values,
            today,
            json,
        } => run_validate(&schema, &values, today, json),
        Command::Check { schema } => run_check(&schema),
        Command::Preview { schema, today } => run_preview(&schema, today),
        Command::Schema => run_schema(),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn eval_context(today: Option<NaiveDate>) -> EvalContext {
    today.map(EvalContext::on).unwrap_or_default()
}

fn load_schema(path: &Path) -> CliResult<FormSchema> {
    let contents = fs::read_to_string(path)?;
    let schema: FormSchema = serde_json::from_str(&contents)?;
    debug!(schema = %schema.id, fields = schema.fields.len(), "schema loaded");
    Ok(schema)
}

fn load_values(path: Option<&Path>) -> CliResult<Values> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        }
        None => Ok(Values::new()),
    }
}

fn values_to_json(values: &Values) -> Value {
    Value::Object(
        values
            .iter()
            .map(|(id, value)| (id.clone(), value.to_json()))
            .collect::<Map<_, _>>(),
    )
}

fn run_recompute(
    schema_path: &Path,
    values_path: Option<&Path>,
    today: Option<NaiveDate>,
) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let values = load_values(values_path)?;
    let result = recompute_detailed(&schema, &values, &eval_context(today));
    if !result.converged {
        eprintln!(
            "Derived values did not settle after {} passes; showing the last pass.",
            result.passes
        );
    }
    println!("{}", serde_json::to_string_pretty(&values_to_json(&result.values))?);
    Ok(())
}

fn run_validate(
    schema_path: &Path,
    values_path: &Path,
    today: Option<NaiveDate>,
    as_json: bool,
) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let values = load_values(Some(values_path))?;
    let values = recompute_with(&schema, &values, &eval_context(today));
    let result = validate(&schema, &values);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Validation result: {}",
            if result.valid { "valid" } else { "invalid" }
        );
        describe_validation(&schema, &result);
    }

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(schema: &FormSchema, result: &ValidationResult) {
    if result.errors.is_empty() {
        return;
    }
    println!("Errors:");
    for field in schema.fields_in_order() {
        if let Some(message) = result.error_for(&field.id) {
            println!("  {} ({}) - {}", field.label, field.id, message);
        }
    }
}

fn run_check(schema_path: &Path) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let problems = check_schema(&schema);
    if problems.is_empty() {
        println!("Schema '{}' is well formed.", schema.name);
        return Ok(());
    }
    println!("Schema '{}' has {} problem(s):", schema.name, problems.len());
    for problem in &problems {
        println!("  - {}", problem);
    }
    Err("schema check failed".into())
}

fn run_preview(schema_path: &Path, today: Option<NaiveDate>) -> CliResult<()> {
    let schema = load_schema(schema_path)?;
    let values = initial_values(&schema, &eval_context(today));
    println!("{}", serde_json::to_string_pretty(&values_to_json(&values))?);
    Ok(())
}

fn run_schema() -> CliResult<()> {
    let schema = schemars::schema_for!(FormSchema);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

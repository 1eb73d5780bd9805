//! CLI for Lumina - Gemini image generation.

use clap::Parser;
use lumina::cli::{prompt_from_stdin, Cli, Command};
use lumina::config::{self, InitOutcome, Settings};
use lumina::{GeminiProvider, GenerationOutcome, LuminaError, OutputWriter};
use std::io::{IsTerminal, Read};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    lumina::logging::init(cli.verbose, cli.json);

    let result = match cli.command {
        Some(Command::Init) => run_init(&cli),
        None => generate(&cli).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, cli.json);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run_init(cli: &Cli) -> lumina::Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::default_config_path().ok_or_else(|| {
            LuminaError::Config("cannot determine home directory; pass --config".into())
        })?,
    };

    match config::init_config(&path)? {
        InitOutcome::Created(path) => {
            println!("Initialized configuration at {}", path.display());
            println!("Edit this file to add your API_KEY or PROJECT_ID.");
        }
        InitOutcome::AlreadyExists(path) => {
            println!("Configuration already exists at {}", path.display());
        }
    }
    Ok(())
}

async fn generate(cli: &Cli) -> lumina::Result<()> {
    let args = &cli.generate;
    args.validate()?;
    let settings = Settings::load(cli.config.as_deref(), &args.config_overrides())?;

    let stdin = if args.needs_stdin() && !std::io::stdin().is_terminal() {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        Some(prompt_from_stdin(buf)?)
    } else {
        None
    };
    let request = args.resolve(stdin, &settings)?;

    let provider = GeminiProvider::from_settings(&settings)?;
    let mut writer = OutputWriter::new(&settings.output_dir, &request.prompt);
    if let Some(filename) = &args.filename {
        writer = writer.with_filename(filename);
    }

    let outcome = lumina::pipeline::run(&provider, &request, &writer).await?;
    report_outcome(&outcome, cli.json)?;
    Ok(())
}

fn report_outcome(outcome: &GenerationOutcome, json_output: bool) -> lumina::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "success": true,
            "requested": outcome.requested,
            "returned": outcome.returned,
            "files": outcome.files,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Generated {} image(s):", outcome.files.len());
    for file in &outcome.files {
        println!("  - {} ({} bytes)", file.path.display(), file.size_bytes);
    }
    if let Some((requested, returned)) = outcome.count_mismatch() {
        println!("Note: asked for {requested}, the model returned {returned}.");
    }
    Ok(())
}

fn report_error(e: &LuminaError, json_output: bool) {
    if json_output {
        let written: Vec<String> = match e {
            LuminaError::PartialWrite { written, .. } => {
                written.iter().map(|p| p.display().to_string()).collect()
            }
            _ => Vec::new(),
        };
        let result = serde_json::json!({
            "success": false,
            "error": e.to_string(),
            "exit_code": e.exit_code(),
            "hint": e.hint(),
            "written": written,
        });
        eprintln!("{result}");
        return;
    }

    eprintln!("error: {e}");
    if let LuminaError::PartialWrite { written, .. } = e {
        eprintln!("kept {} file(s) already written:", written.len());
        for path in written {
            eprintln!("  - {}", path.display());
        }
    }
    if let Some(hint) = e.hint() {
        eprintln!("hint: {hint}");
    }
}

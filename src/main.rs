use clap::Parser;
use snapshot_patch::{
    ChangeRegistry, CodeContext, CodeTranslator, HashStore, PatchConfig, PatchRequest,
    PatchResponse, Policy, SyntaxMap, generate_session_id, run_policy,
};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Apply categorized structural edits to source literals
#[derive(Parser, Debug)]
#[command(name = "snapshot-patch")]
#[command(version = "0.1.0")]
#[command(about = "Policy-filtered, separator-correct literal edits", long_about = None)]
struct Args {
    /// JSON file containing the patch request (omit to read from stdin)
    #[arg(short, long)]
    request: Option<String>,

    /// Comma separated categories to apply (create, fix, update, trim)
    #[arg(short, long)]
    policy: Option<String>,

    /// Write the changed files instead of previewing them
    #[arg(short, long)]
    commit: bool,

    /// Directory of the content-addressed store for external values
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Output structured JSON instead of human-readable
    #[arg(short, long)]
    json: bool,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Context lines in diffs
    #[arg(long, default_value_t = 3)]
    context: usize,

    /// Log debug information to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Read PatchRequest from file path or stdin
fn read_patch_request(path: Option<&String>) -> Result<PatchRequest, Box<dyn std::error::Error>> {
    let json_str = if let Some(p) = path {
        fs::read_to_string(p)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let request: PatchRequest = serde_json::from_str(&json_str)?;
    Ok(request)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(config: &PatchConfig, request: PatchRequest, session_id: String) -> PatchResponse {
    let resolver: SyntaxMap = request.nodes.into_iter().collect();
    let translator = CodeTranslator::new();
    let store = config.store_root.as_ref().map(HashStore::new);
    let mut context = CodeContext::new(&translator);
    if let Some(store) = &store {
        context = context.with_store(store);
    }

    let base = ChangeRegistry::new().with_diff_context(config.diff_context);
    let outcome = run_policy(&base, &request.intents, &config.policy, &resolver, &context);
    let files = if config.commit {
        outcome.registry.commit()
    } else {
        outcome.registry.preview()
    };

    PatchResponse::success(session_id, &config.policy, &outcome, &files, config.commit)
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let request = match read_patch_request(args.request.as_ref()) {
        Ok(req) => req,
        Err(e) => {
            let response = PatchResponse::failure(
                generate_session_id(),
                format!("Error reading patch request: {}", e),
            );
            output_response(&response, args.json, args.output.as_ref());
            std::process::exit(1);
        }
    };

    // Handle "auto" session_id
    let session_id = if request.session_id == "auto" {
        generate_session_id()
    } else {
        request.session_id.clone()
    };

    let cli_policy = match args.policy.as_deref().map(str::parse::<Policy>).transpose() {
        Ok(policy) => policy,
        Err(e) => {
            let response = PatchResponse::failure(session_id, format!("Invalid policy: {}", e));
            output_response(&response, args.json, args.output.as_ref());
            std::process::exit(1);
        }
    };

    let config = PatchConfig {
        policy: PatchConfig::resolve_policy(cli_policy, request.policy.clone()),
        commit: args.commit,
        store_root: args.store.clone(),
        diff_context: args.context,
    };

    let response = run(&config, request, session_id);
    output_response(&response, args.json, args.output.as_ref());

    if !response.success {
        std::process::exit(1);
    }
}

/// Format and output the response
fn output_response(response: &PatchResponse, json_mode: bool, output_path: Option<&String>) {
    let output = if json_mode {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| {
            r#"{"error": "Failed to serialize response"}"#.to_string()
        })
    } else if let Some(error) = &response.error {
        format!("Error: {}", error)
    } else {
        let mut text = String::new();
        for category in &response.categories {
            text.push_str(&format!(
                "{}: {} intent(s), {} file(s) would change\n",
                category.category, category.intents, category.files_changed
            ));
        }
        for file in &response.files {
            text.push_str(&format!("{} {}\n", file.status, file.path));
            if let Some(diff) = &file.diff {
                text.push_str(diff);
            }
            if let Some(error) = &file.error {
                text.push_str(&format!("  {}\n", error));
            }
        }
        for skipped in &response.skipped {
            text.push_str(&format!("skipped intent {}: {}\n", skipped.index, skipped.reason));
        }
        let verb = if response.committed { "Wrote" } else { "Would change" };
        text.push_str(&format!(
            "{} {} file(s) with policy [{}]",
            verb,
            response.changed_count(),
            response.policy
        ));
        text
    };

    // Write to file or stdout
    if let Some(path) = output_path {
        if let Err(e) = fs::write(path, &output) {
            eprintln!("Failed to write output to '{}': {}", path, e);
            std::process::exit(1);
        }
    } else {
        println!("{}", output);
    }
}

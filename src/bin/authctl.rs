use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};

use users_api::auth::{AuthController, AuthHook, AuthSnapshot, ErrorInfo, ErrorKind, install_store};

#[derive(Parser, Debug)]
#[command(
    name = "authctl",
    about = "Drive the identity provider session from the command line"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current session, refreshing it if it is about to expire.
    Status,
    /// Register a new account.
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Stored as `full_name` in the user's profile metadata.
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Sign in with email and password.
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Print the URL that starts a federated sign-in (google, github, discord).
    SignInWith { provider: String },
    /// Finish a federated sign-in with the code from the callback URL.
    Callback {
        #[arg(long)]
        code: String,
    },
    SignOut,
    /// Send a password reset email.
    ResetPassword {
        #[arg(long)]
        email: String,
    },
    /// Print the auth state every time it changes until interrupted.
    Watch,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorInfo>,
    snapshot: AuthSnapshot,
}

#[tokio::main]
async fn main() -> ExitCode {
    users_api::init_logger();
    let args = Args::parse();

    let controller = match AuthController::connect() {
        Ok(controller) => Arc::new(controller),
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let store = install_store(controller.clone());

    let bootstrap = controller.bootstrap().await;
    let outcome = match args.command {
        Command::Watch => return watch(store.hook()).await,
        Command::Status => bootstrap.map(|principal| json!({ "principal": principal })),
        Command::SignUp {
            email,
            password,
            full_name,
        } => {
            let metadata = full_name.map(|name| json!({ "full_name": name }));
            to_json(controller.sign_up(&email, &password, metadata).await)
        }
        Command::SignIn { email, password } => to_json(controller.sign_in(&email, &password).await),
        Command::SignInWith { provider } => {
            to_json(controller.sign_in_with_provider_named(&provider).await)
        }
        Command::Callback { code } => to_json(controller.complete_provider_sign_in(&code).await),
        Command::SignOut => to_json(controller.sign_out().await),
        Command::ResetPassword { email } => to_json(controller.reset_password(&email).await),
    };

    let (result, error) = match &outcome {
        Ok(value) => (Some(value.clone()), None),
        Err(err) => (None, Some(err)),
    };
    print_json(&Report {
        result,
        error,
        snapshot: store.hook().snapshot(),
    });

    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn watch(mut hook: AuthHook) -> ExitCode {
    print_json(&hook.snapshot());

    loop {
        tokio::select! {
            changed = hook.changed() => match changed {
                Some(snapshot) => print_json(&snapshot),
                None => return ExitCode::SUCCESS,
            },
            _ = tokio::signal::ctrl_c() => return ExitCode::SUCCESS,
        }
    }
}

fn to_json<T: Serialize>(result: Result<T, ErrorInfo>) -> Result<Value, ErrorInfo> {
    result.and_then(|value| {
        serde_json::to_value(value).map_err(|err| {
            ErrorInfo::new(ErrorKind::Provider, err.to_string())
        })
    })
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("error: failed to render output: {err}"),
    }
}

//! HZN Courier - Command Line Entry Point
//!
//! Drives the client core from a terminal: sign in, manage the profile and
//! follow a delivery's tracking timeline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use hzn_courier_lib::{
    api::OtpPurpose,
    commands::{self, AvatarImage, Outcome},
    config::Config,
    forms::{
        ForgotPasswordForm, Frequency, LoginForm, OtpForm, ResetPasswordForm,
        SenderAccessForm, SignUpForm, UseCase,
    },
    logging,
    storage::SecureStorage,
    timeline::{stages, timeline_for_label, Delivery, DeliveryStatus, Stage, TrackingEvent},
    AppState,
};

#[derive(Parser)]
#[command(
    name = "hzn",
    version = env!("CARGO_PKG_VERSION"),
    about = "HZN Courier client: account, profile and delivery tracking",
    long_about = None
)]
struct Cli {
    /// Directory for the stored session and logs
    #[arg(global = true, long = "data-dir")]
    data_dir: Option<PathBuf>,

    /// Override the API origin (otherwise HZN_API_URL / HZN_ENV)
    #[arg(global = true, long = "api-url")]
    api_url: Option<String>,

    /// Print results as JSON
    #[arg(global = true, long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Confirm an email address with the emailed code
    Verify {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },

    /// Request a new code
    Resend {
        #[arg(long)]
        email: String,
        /// Resend a password reset code instead of a verification code
        #[arg(long)]
        reset: bool,
    },

    /// Email a password reset code
    ForgotPassword {
        #[arg(long)]
        email: String,
    },

    /// Set a new password using the emailed code
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        password: String,
    },

    /// Sign in with a Google ID token
    Google {
        #[arg(long)]
        id_token: String,
    },

    /// Show the signed-in user's profile, refreshed from the server
    Me,

    /// Edit profile fields
    Profile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        country_code: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Upload a new profile picture
    Avatar {
        path: PathBuf,
    },

    /// Request sender access for an organisation
    SenderAccess {
        #[arg(long)]
        org: String,
        #[arg(long)]
        address: String,
        /// Food Delivery, Document Logistics, Equipment Transport or Other
        #[arg(long)]
        use_case: String,
        #[arg(long, default_value = "")]
        custom_use_case: String,
        /// Daily, Weekly, Monthly or Occasional
        #[arg(long)]
        frequency: String,
        #[arg(long)]
        agree_device_control: bool,
        #[arg(long)]
        agree_terms: bool,
    },

    /// Show the tracking timeline for a delivery status
    Timeline {
        status: String,
    },

    /// Show the home screen delivery card
    Home {
        /// Preview the card with another status
        #[arg(long)]
        status: Option<String>,
    },

    /// Show the stored session
    Session,

    /// Sign out and remove the stored session
    Logout,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.data_dir.as_deref());
    info!("HZN Courier starting...");

    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url.as_deref() {
        config = config.with_api_url(url)?;
    }

    let storage = match cli.data_dir.as_deref() {
        Some(dir) => SecureStorage::at(dir),
        None => SecureStorage::new(),
    };
    let state = AppState::new(config, Box::new(storage))?;
    commands::restore_session(&state);

    let out = Printer { json: cli.json };
    let code = match cli.command {
        Commands::Signup { first_name, last_name, email, password } => {
            let form = SignUpForm { first_name, last_name, email, password };
            out.outcome(commands::sign_up(&state, &form).await, |r| {
                format!("{} Enter the code sent to {}.", r.message, r.email)
            })
        }
        Commands::Login { email, password } => {
            let form = LoginForm { email, password };
            out.outcome(commands::login(&state, &form).await, |u| {
                format!("Welcome back, {}!", u.first_name)
            })
        }
        Commands::Verify { email, code } => {
            let form = OtpForm { email, code };
            out.outcome(commands::verify_email(&state, &form).await, |u| {
                format!("Email verified. Signed in as {}.", u.full_name())
            })
        }
        Commands::Resend { email, reset } => {
            let purpose = if reset { OtpPurpose::PasswordReset } else { OtpPurpose::EmailVerification };
            out.outcome(commands::resend_code(&state, &email, purpose).await, |_| {
                "Code resent! Check your inbox.".to_string()
            })
        }
        Commands::ForgotPassword { email } => {
            let form = ForgotPasswordForm { email };
            out.outcome(commands::forgot_password(&state, &form).await, |r| {
                format!("{} The code expires in {} minutes.", r.message, r.expires_in_minutes)
            })
        }
        Commands::ResetPassword { email, code, password } => {
            let form = ResetPasswordForm {
                email,
                code,
                confirm_password: password.clone(),
                new_password: password,
            };
            out.outcome(commands::reset_password(&state, &form).await, |r| r.message.clone())
        }
        Commands::Google { id_token } => {
            out.outcome(commands::google_sign_in(&state, &id_token).await, |u| {
                format!("Signed in as {}.", u.full_name())
            })
        }
        Commands::Me => out.outcome(commands::refresh_profile(&state).await, describe_user),
        Commands::Profile { first_name, last_name, country_code, phone } => {
            let mut form = commands::profile_form(&state).unwrap_or_default();
            if let Some(first_name) = first_name {
                form.first_name = first_name;
            }
            if let Some(last_name) = last_name {
                form.last_name = last_name;
            }
            if let Some(country_code) = country_code {
                form.country_code = country_code;
            }
            if let Some(phone) = phone {
                form.phone = phone;
            }
            out.outcome(commands::save_profile(&state, &form).await, |_| {
                "Profile updated successfully!".to_string()
            })
        }
        Commands::Avatar { path } => {
            let image = read_image(&path)?;
            out.outcome(commands::upload_avatar(&state, image).await, |_| {
                "Profile picture updated!".to_string()
            })
        }
        Commands::SenderAccess {
            org,
            address,
            use_case,
            custom_use_case,
            frequency,
            agree_device_control,
            agree_terms,
        } => {
            let form = SenderAccessForm {
                org_name: org,
                address,
                use_case: UseCase::from_label(&use_case),
                custom_use_case,
                frequency: Frequency::from_label(&frequency),
                agrees_device_control: agree_device_control,
                agrees_terms: agree_terms,
            };
            out.outcome(commands::request_sender_access(&state, &form), |r| {
                format!("Sender access request for {} is ready ({}, {}).", r.org_name, r.use_case, r.frequency.label())
            })
        }
        Commands::Timeline { status } => {
            let events = timeline_for_label(&status);
            out.timeline(&events);
            ExitCode::SUCCESS
        }
        Commands::Home { status } => {
            let mut delivery = Delivery::placeholder();
            if let Some(status) = status {
                delivery.status = status.parse::<DeliveryStatus>()?;
            }
            let view = commands::home(&state, delivery);
            if out.json {
                out.print_json(&view);
            } else {
                if let Some(name) = &view.first_name {
                    println!("Hi {name}");
                }
                println!("Incoming Deliveries");
                println!("{} [{}]", view.delivery.bot_name, view.delivery.status);
                println!("{}", view.delivery.location);
                println!("Order ID  {}", view.delivery.order_id);
                println!("Bot ID    {}", view.delivery.bot_id);
                println!("Code      {}", view.delivery.spaced_code());
                let events: Vec<TrackingEvent> = view.timeline.into_iter().map(|row| row.event).collect();
                out.timeline(&events);
            }
            ExitCode::SUCCESS
        }
        Commands::Session => {
            let user = state.session.lock().ok().and_then(|s| s.user().cloned());
            match user {
                Some(user) if out.json => out.print_json(&user),
                Some(user) => println!("{}", describe_user(&user)),
                None => println!("Not signed in"),
            }
            ExitCode::SUCCESS
        }
        Commands::Logout => out.outcome(commands::logout(&state), |_| "Signed out".to_string()),
    };

    Ok(code)
}

fn read_image(path: &Path) -> anyhow::Result<AvatarImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "avatar.jpg".to_string());
    let local_uri = format!("file://{}", path.display());
    Ok(AvatarImage { file_name, bytes, local_uri })
}

fn describe_user(user: &hzn_courier_lib::auth::UserProfile) -> String {
    let mut lines = vec![
        format!("{} ({})", user.full_name(), user.email),
        format!("Phone: {}", user.phone.as_deref().unwrap_or("Add a phone number")),
    ];
    if let Some(avatar) = &user.avatar_url {
        lines.push(format!("Avatar: {avatar}"));
    }
    lines.push(format!("Sender access: {}", if user.is_sender { "yes" } else { "no" }));
    lines.join("\n")
}

/// Terminal rendering of command results
struct Printer {
    json: bool,
}

impl Printer {
    fn print_json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Could not encode output: {e}"),
        }
    }

    fn outcome<T: Serialize>(&self, outcome: Outcome<T>, done: impl FnOnce(&T) -> String) -> ExitCode {
        if self.json {
            self.print_json(&outcome);
            return if outcome.is_done() { ExitCode::SUCCESS } else { ExitCode::FAILURE };
        }

        match outcome {
            Outcome::Done(value) => {
                println!("{}", done(&value));
                ExitCode::SUCCESS
            }
            Outcome::Invalid(errors) => {
                eprintln!("Please fix the following:\n{errors}");
                ExitCode::FAILURE
            }
            Outcome::NeedsVerification { email, message } => {
                eprintln!("{message}");
                eprintln!("Run `hzn verify --email {email} --code <CODE>` once the code arrives.");
                ExitCode::FAILURE
            }
            Outcome::Busy => {
                eprintln!("Still working on the previous request");
                ExitCode::FAILURE
            }
            Outcome::CoolingDown { seconds } => {
                eprintln!("Resend code in {seconds} seconds");
                ExitCode::FAILURE
            }
            Outcome::Failed { message, .. } => {
                eprintln!("{message}");
                ExitCode::FAILURE
            }
        }
    }

    fn timeline(&self, events: &[TrackingEvent]) {
        if self.json {
            self.print_json(&events);
            return;
        }

        if events.is_empty() {
            println!("No tracking events");
            return;
        }

        println!("Timeline");
        for (stage, event) in stages(events) {
            let marker = match (stage, event.is_terminal_error) {
                (Stage::Current, true) => "!!",
                (Stage::Current, false) => "->",
                (Stage::Completed, _) => "  ",
            };
            println!("{marker} {:<10} {:>8}  {}", event.status.label(), event.timestamp, event.description);
        }
    }
}

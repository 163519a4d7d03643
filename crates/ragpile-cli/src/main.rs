mod cli;
mod output;
mod session;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command, LoginCommand, SchedulesCommand, ThreadsCommand};
use output::OutputHandler;
use log::LevelFilter;
use ragpile_core::auth::{CallbackRegistry, extract_code, oauth_channel};
use ragpile_core::models::TelegramAuthPayload;
use ragpile_core::{
    ChatMessage, ChatRequest, Client, Config, LoginOutcome, StreamState, UseApi, UseStreamingApi,
    parse_tool_calls, resolve_home,
};
use session::Session;
use std::future::Future;
use std::io::{self, BufRead, ErrorKind, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Install the logger. `RUST_LOG` wins; otherwise `warn`, or `debug` once
/// verbosity is raised with [`raise_verbosity`].
///
/// Returns the most verbose level the logger's filter admits.
fn init_logging(verbose: bool) -> LevelFilter {
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).build();
    let ceiling = logger.filter();
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        let explicit = std::env::var_os("RUST_LOG").is_some();
        log::set_max_level(if verbose || explicit {
            ceiling
        } else {
            ceiling.min(LevelFilter::Warn)
        });
    }
    ceiling
}

fn raise_verbosity(ceiling: LevelFilter) {
    log::set_max_level(ceiling);
}

/// Run one request through a [`UseApi`] hook, noting it on stderr while in flight.
async fn fetch<T, F, Fut>(output: &OutputHandler, what: &str, f: F) -> io::Result<T>
where
    T: Clone,
    F: Fn() -> Fut,
    Fut: Future<Output = ragpile_core::Result<T>>,
{
    let hook = UseApi::new(f);
    let pending = hook.call();
    if hook.loading() && io::stderr().is_terminal() {
        output.diagnostic(&format!("[Fetching {}...]", what));
    }
    Ok(pending.await?)
}

/// Print the streaming text as it grows. Returns once the hook is dropped.
async fn print_deltas(mut rx: watch::Receiver<StreamState>) {
    let mut printed = 0;
    while rx.changed().await.is_ok() {
        let text = rx.borrow_and_update().text.clone();
        if text.len() < printed {
            printed = 0;
        }
        print!("{}", &text[printed..]);
        let _ = io::stdout().flush();
        printed = text.len();
    }
}

async fn chat(
    client: Client,
    model: String,
    system: Option<String>,
    prompt: String,
    output: &OutputHandler,
) -> io::Result<()> {
    let chat = UseStreamingApi::new(move |prompt: String| {
        let mut messages: Vec<_> = system.iter().map(ChatMessage::system).collect();
        messages.push(ChatMessage::user(prompt));
        client.chat_stream(&ChatRequest::new(model.clone(), messages))
    });
    let printer = (!output.is_json()).then(|| tokio::spawn(print_deltas(chat.subscribe())));

    let result = chat.call(prompt).await;
    let text = chat.text();
    drop(chat);

    if let Some(printer) = printer {
        printer.await.map_err(io::Error::other)?;
        println!();
    }
    result?;
    output.emit(&serde_json::json!({ "text": text }), String::new)
}

/// Read an authorization code (or redirect URL) from stdin.
///
/// Returns `None` when stdin closes without a usable code.
async fn read_code() -> io::Result<Option<String>> {
    let (sender, listener) = oauth_channel();
    tokio::task::spawn_blocking(move || {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_ok()
            && let Some(code) = extract_code(&line)
        {
            let _ = sender.post(code);
        }
    });
    match listener.recv().await {
        Ok(code) => Ok(Some(code)),
        Err(ragpile_core::Error::ChannelClosed) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pass a widget payload to the login flow through a scoped registration.
async fn widget_payload(raw: &str) -> io::Result<TelegramAuthPayload> {
    let payload: TelegramAuthPayload =
        serde_json::from_str(raw).map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

    let widget = CallbackRegistry::new();
    let (sender, listener) = oauth_channel();
    let sender = Mutex::new(Some(sender));
    let registration = widget.register(move |payload: &TelegramAuthPayload| {
        let sender = sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(sender) = sender {
            let _ = sender.post(payload.clone());
        }
    });
    let handled = widget.emit(&payload);
    log::debug!("telegram payload for id {} reached {} handler(s)", payload.id, handled);
    drop(registration);
    Ok(listener.recv().await?)
}

fn finish_login(home: &Path, outcome: LoginOutcome, output: &OutputHandler) -> io::Result<()> {
    let token = outcome.token.ok_or_else(|| {
        io::Error::new(
            ErrorKind::PermissionDenied,
            "server did not issue a session cookie",
        )
    })?;
    let user = outcome.user;
    Session {
        token: Some(token),
        email: Some(user.email.clone()),
    }
    .save(home)?;
    output.emit(&user, || format!("Signed in as {}", user.email))
}

async fn update_schedule(
    client: &Client,
    id: String,
    code: Option<String>,
    code_file: Option<std::path::PathBuf>,
    interval: Option<i64>,
    output: &OutputHandler,
) -> io::Result<()> {
    if code.is_none() && code_file.is_none() && interval.is_none() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            "nothing to update (use --code, --code-file or --interval)",
        ));
    }
    if let Some(seconds) = interval
        && seconds <= 0
    {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("interval must be positive, got {}", seconds),
        ));
    }

    let schedules = fetch(output, "schedules", || client.schedules()).await?;
    let mut schedule = schedules
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("No schedule '{}'", id)))?;

    if let Some(code) = code {
        schedule.code = code;
    } else if let Some(path) = code_file {
        schedule.code = std::fs::read_to_string(path)?;
    }
    if let Some(seconds) = interval {
        schedule.interval_seconds = seconds;
    }

    let updated = client.update_schedule(&schedule).await?;
    output.emit(&updated, || output::render_schedules(std::slice::from_ref(&updated)))
}

async fn login(
    client: &Client,
    provider: LoginCommand,
    home: &Path,
    output: &OutputHandler,
) -> io::Result<()> {
    match provider {
        LoginCommand::Google { reason, code } => {
            let code = match code {
                Some(code) => extract_code(&code),
                None => {
                    let auth = match reason {
                        Some(reason) => client.google_token_url(reason.into()).await?,
                        None => client.google_login_url().await?,
                    };
                    if output.is_json() {
                        let json = serde_json::json!({"type": "auth_url", "auth_url": auth.auth_url});
                        eprintln!("{}", json);
                    } else {
                        eprintln!("Open this URL to sign in:\n  {}", auth.auth_url);
                        eprintln!("Then paste the code or the full redirect URL:");
                    }
                    read_code().await?
                }
            }
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "no authorization code"))?;

            match reason {
                Some(reason) => {
                    let user = client.google_token_callback(reason.into(), &code).await?;
                    output.emit(&user, || output::render_user(&user, Utc::now()))
                }
                None => finish_login(home, client.google_callback(&code).await?, output),
            }
        }
        LoginCommand::Telegram { payload } => {
            let payload = widget_payload(&payload).await?;
            finish_login(home, client.telegram_callback(&payload).await?, output)
        }
    }
}

async fn run(cli: Cli, output: &OutputHandler) -> io::Result<()> {
    let ceiling = init_logging(cli.verbose);
    let home = resolve_home(cli.home)?;
    let config = Config::load(&home)?;
    if config.verbose {
        raise_verbosity(ceiling);
    }
    log::debug!("home: {}", home.display());

    match &cli.command {
        Command::ParseToolCalls { text } => {
            let calls = parse_tool_calls(text.trim());
            return output.emit(&calls, || output::render_tool_calls(&calls));
        }
        Command::Config => {
            let api_root = config.api_root()?.to_string();
            let rendered = toml::to_string_pretty(&config).map_err(io::Error::other)?;
            let data = serde_json::json!({
                "home": home.display().to_string(),
                "api_root": api_root,
                "config": config,
            });
            return output.emit(&data, || {
                format!("# home: {}\n# api: {}\n{}", home.display(), api_root, rendered.trim_end())
            });
        }
        _ => {}
    }

    let session = Session::load(&home)?;
    let token = session.effective_token(std::env::var("RAGPILE_TOKEN").ok());
    if token.is_none() {
        log::debug!("no session token; requests are anonymous");
    }
    let client = Client::from_config(&config)?.with_token(token);

    match cli.command {
        Command::Chat {
            prompt,
            model,
            system,
        } => {
            let model = model.unwrap_or_else(|| config.model.clone());
            chat(client, model, system, prompt.join(" "), output).await
        }
        Command::Threads {
            action: ThreadsCommand::List,
        } => {
            let threads = fetch(output, "threads", || client.threads()).await?;
            output.emit(&threads, || output::render_threads(&threads))
        }
        Command::Threads {
            action: ThreadsCommand::Show { id },
        } => {
            let thread = fetch(output, "thread", || client.thread(&id)).await?;
            output.emit(&thread, || output::render_thread(&thread))
        }
        Command::Schedules {
            action: SchedulesCommand::List,
        } => {
            let schedules = fetch(output, "schedules", || client.schedules()).await?;
            output.emit(&schedules, || output::render_schedules(&schedules))
        }
        Command::Schedules {
            action:
                SchedulesCommand::Update {
                    id,
                    code,
                    code_file,
                    interval,
                },
        } => update_schedule(&client, id, code, code_file, interval, output).await,
        Command::Login { provider } => login(&client, provider, &home, output).await,
        Command::Logout => {
            Session::default().save(&home)?;
            if let Err(e) = client.logout().await {
                log::warn!("server logout failed, local session cleared: {}", e);
            }
            output.emit(&serde_json::json!({ "logged_out": true }), || {
                "Signed out.".to_string()
            })
        }
        Command::Whoami => {
            let user = fetch(output, "user", || client.me()).await?;
            output.emit(&user, || output::render_user(&user, Utc::now()))
        }
        Command::Models => {
            let models = fetch(output, "models", || client.models()).await?;
            let priced = output::priced_models(&models);
            output.emit(&priced, || output::render_models(&priced))
        }
        Command::ParseToolCalls { .. } | Command::Config => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = OutputHandler::new(cli.json);
    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{:?}", e);
            output.emit_error(&e);
            ExitCode::FAILURE
        }
    }
}

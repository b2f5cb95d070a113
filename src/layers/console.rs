use std::pin::pin;

use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout},
    signal,
};
use tracing::{info, warn};

use crate::{
    error::AppResult,
    implementations::billing::BillingContract,
    layers::panel::{UserPort, WalletPanel},
    types::{Command, Role, Session},
};

/// Line-oriented user port: prompts and notices go to the writer, answers
/// come from the reader.
pub struct ConsolePort<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl ConsolePort<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> ConsolePort<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Next input line without its terminator, `None` at EOF.
    pub async fn read_line(&mut self) -> AppResult<Option<String>> {
        self.line.clear();
        let bytes = self.reader.read_line(&mut self.line).await?;
        if bytes == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub async fn write_text(&mut self, text: &str) -> AppResult<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<R, W> UserPort for ConsolePort<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn request_input(
        &mut self,
        message: &str,
        default: Option<&str>,
    ) -> AppResult<Option<String>> {
        let prompt = match default {
            Some(default) => format!("{message} [{default}]: "),
            None => format!("{message}: "),
        };
        self.write_text(&prompt).await?;

        let Some(answer) = self.read_line().await? else {
            return Ok(None);
        };
        if answer.trim().is_empty() {
            return Ok(Some(default.unwrap_or_default().to_string()));
        }
        Ok(Some(answer))
    }

    async fn notify(&mut self, message: &str) -> AppResult<()> {
        self.write_text(&format!("{message}\n")).await
    }
}

/// Interactive front-end: one command per line until `quit`, EOF or Ctrl-C.
pub struct Console<C, R, W> {
    panel: WalletPanel<C, ConsolePort<R, W>>,
}

impl<C, R, W> Console<C, R, W>
where
    C: BillingContract,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(panel: WalletPanel<C, ConsolePort<R, W>>) -> Self {
        Self { panel }
    }

    pub fn panel(&self) -> &WalletPanel<C, ConsolePort<R, W>> {
        &self.panel
    }

    pub async fn run(&mut self) -> AppResult<()> {
        self.run_until(async {
            if let Err(err) = signal::ctrl_c().await {
                warn!("cannot listen for Ctrl-C: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Command loop that ends early once `shutdown` resolves, including while
    /// a prompt or contract call is still outstanding.
    pub async fn run_until<F>(&mut self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut shutdown = pin!(shutdown);

        self.say("Welcome to the bill payment wallet. Type `help` for commands.")
            .await?;
        self.show_status().await?;

        loop {
            let keep_going = tokio::select! {
                step = self.step() => step?,
                _ = &mut shutdown => {
                    info!("interrupted, leaving");
                    false
                }
            };
            if !keep_going {
                break;
            }
        }

        Ok(())
    }

    async fn step(&mut self) -> AppResult<bool> {
        self.panel.ui_mut().write_text("> ").await?;
        let Some(line) = self.panel.ui_mut().read_line().await? else {
            info!("input closed, leaving");
            return Ok(false);
        };
        if line.trim().is_empty() {
            return Ok(true);
        }
        self.handle_line(&line).await
    }

    /// Returns `false` once the user asked to leave.
    pub async fn handle_line(&mut self, line: &str) -> AppResult<bool> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                warn!("could not parse {line:?}: {err}");
                self.say(&err.user_message()).await?;
                return Ok(true);
            }
        };

        match command {
            Command::Quit => return Ok(false),
            Command::Help => self.show_help().await?,
            Command::Status => self.show_status().await?,
            command if !self.panel.session().offers(&command) => {
                self.say("That action is not available right now; type `status` to see what is.")
                    .await?;
            }
            command => {
                let shows_view = matches!(
                    command,
                    Command::ChangeRole(_) | Command::Refresh | Command::CreateWallet
                );
                self.panel.perform(command).await?;
                if shows_view {
                    self.show_status().await?;
                }
            }
        }
        Ok(true)
    }

    async fn say(&mut self, message: &str) -> AppResult<()> {
        self.panel.ui_mut().notify(message).await
    }

    async fn show_status(&mut self) -> AppResult<()> {
        let text = render_view(self.panel.session()).join("\n");
        self.say(&text).await
    }

    async fn show_help(&mut self) -> AppResult<()> {
        self.say(HELP).await
    }
}

const HELP: &str = "\
Views:     user | admin | auth
Wallet:    register | open [mnemonic words...] | refresh | status
User:      pay <bill> | topup
Admin:     authorise | unauthorise
Auth:      service <bill>
Other:     help | quit";

/// Text rendering of the active view: the status line plus the actions it offers.
pub fn render_view(session: &Session) -> Vec<String> {
    let Some(status) = session.status_line() else {
        return vec!["Pick a view: user | admin | auth".to_string()];
    };

    let mut lines = vec![status];
    match session.role {
        Role::User => {
            lines.push("User section".into());
            if session.has_wallet() {
                for bill in &session.bills {
                    lines.push(format!("  pay {bill}"));
                }
                lines.push("  topup".into());
            } else {
                lines.push("  register".into());
            }
            lines.push("  open <mnemonic>".into());
        }
        Role::Admin => {
            lines.push("Admin section".into());
            lines.push("  open <mnemonic>".into());
            lines.push("  authorise".into());
            lines.push("  unauthorise".into());
        }
        Role::Auth => {
            lines.push("Authorised section".into());
            lines.push("  open <mnemonic>".into());
            for bill in &session.bills {
                lines.push(format!("  service {bill}"));
            }
        }
        Role::None => {}
    }
    lines
}

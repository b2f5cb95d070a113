use ethers::types::{Address, U256};
use std::{fmt, str::FromStr};

use crate::error::AppError;

/// Which section of the panel is on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    None,
    User,
    Admin,
    Auth,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::None => write!(f, ""),
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::Auth => write!(f, "auth"),
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "auth" | "authorised" | "authorized" => Ok(Role::Auth),
            other => Err(AppError::InvalidInput(format!("unknown role: {other}"))),
        }
    }
}

/// Everything the panel remembers between actions. Lost on exit.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub wallet_address: Option<Address>,
    pub role: Role,
    pub mnemonic_input: String,
    pub cached_balance: U256,
    pub bills: Vec<String>,
}

impl Session {
    pub fn new(bills: Vec<String>) -> Self {
        Self {
            bills,
            ..Self::default()
        }
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet_address.is_some()
    }

    pub fn is_visible(&self, view: Role) -> bool {
        view != Role::None && self.role == view
    }

    /// Header shown once a role is picked.
    pub fn status_line(&self) -> Option<String> {
        if self.role == Role::None {
            return None;
        }
        let wallet = self
            .wallet_address
            .map(|address| format!("{address:#x}"))
            .unwrap_or_default();
        Some(format!(
            "Your wallet is {wallet} - {}, Balance is {}",
            self.role, self.cached_balance
        ))
    }

    /// Case-insensitive lookup of a configured bill, returning its canonical name.
    pub fn resolve_bill(&self, name: &str) -> Option<&str> {
        let wanted = name.trim();
        self.bills
            .iter()
            .find(|bill| bill.eq_ignore_ascii_case(wanted))
            .map(String::as_str)
    }

    /// Whether the active view offers `command`, mirroring which buttons are
    /// shown and enabled.
    pub fn offers(&self, command: &Command) -> bool {
        match command {
            Command::ChangeRole(_) | Command::Status | Command::Help | Command::Quit => true,
            Command::Refresh | Command::OpenWallet(_) => self.role != Role::None,
            Command::CreateWallet => self.is_visible(Role::User) && !self.has_wallet(),
            Command::PayBill(_) | Command::TopupWallet => {
                self.is_visible(Role::User) && self.has_wallet()
            }
            Command::Authorise | Command::Unauthorise => self.is_visible(Role::Admin),
            Command::RegisterService(_) => self.is_visible(Role::Auth),
        }
    }
}

/// One line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ChangeRole(Role),
    CreateWallet,
    OpenWallet(Option<String>),
    PayBill(String),
    TopupWallet,
    Refresh,
    Authorise,
    Unauthorise,
    RegisterService(String),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head.to_ascii_lowercase().as_str() {
            "user" | "admin" | "auth" => Command::ChangeRole(head.parse()?),
            "register" | "create" => Command::CreateWallet,
            "open" if rest.is_empty() => Command::OpenWallet(None),
            "open" => Command::OpenWallet(Some(rest.to_string())),
            "pay" => Command::PayBill(required(head, rest, "bill name")?),
            "topup" => Command::TopupWallet,
            "refresh" => Command::Refresh,
            "authorise" | "authorize" => Command::Authorise,
            "unauthorise" | "unauthorize" => Command::Unauthorise,
            "service" => Command::RegisterService(required(head, rest, "bill name")?),
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "" => return Err(AppError::InvalidInput("empty command".into())),
            other => return Err(AppError::InvalidInput(format!("unknown command: {other}"))),
        };
        Ok(command)
    }
}

fn required(command: &str, rest: &str, what: &str) -> Result<String, AppError> {
    if rest.is_empty() {
        Err(AppError::InvalidInput(format!("{command} needs a {what}")))
    } else {
        Ok(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(vec!["Road Tax".into(), "Property Tax".into()])
    }

    #[test]
    fn only_active_view_is_visible() {
        let mut s = session();
        assert!(!s.is_visible(Role::User));
        assert!(s.status_line().is_none());

        s.role = Role::Admin;
        assert!(s.is_visible(Role::Admin));
        assert!(!s.is_visible(Role::User));
        assert!(!s.is_visible(Role::Auth));
        assert!(!s.is_visible(Role::None));
    }

    #[test]
    fn status_line_reports_wallet_and_balance() {
        let mut s = session();
        s.role = Role::User;
        s.wallet_address = Some(Address::from_low_u64_be(1));
        s.cached_balance = U256::from(70u64);
        assert_eq!(
            s.status_line().unwrap(),
            "Your wallet is 0x0000000000000000000000000000000000000001 - user, Balance is 70"
        );
    }

    #[test]
    fn resolves_bills_ignoring_case() {
        let s = session();
        assert_eq!(s.resolve_bill("road tax"), Some("Road Tax"));
        assert_eq!(s.resolve_bill(" PROPERTY TAX "), Some("Property Tax"));
        assert_eq!(s.resolve_bill("Water"), None);
    }

    #[test]
    fn user_view_gates_on_wallet() {
        let mut s = session();
        s.role = Role::User;
        assert!(s.offers(&Command::CreateWallet));
        assert!(!s.offers(&Command::TopupWallet));
        assert!(!s.offers(&Command::PayBill("Road Tax".into())));

        s.wallet_address = Some(Address::from_low_u64_be(1));
        assert!(!s.offers(&Command::CreateWallet));
        assert!(s.offers(&Command::TopupWallet));
        assert!(!s.offers(&Command::Authorise));
    }

    #[test]
    fn admin_and_auth_views_ignore_wallet() {
        let mut s = session();
        s.role = Role::Admin;
        assert!(s.offers(&Command::Authorise));
        assert!(s.offers(&Command::Unauthorise));
        assert!(!s.offers(&Command::RegisterService("Road Tax".into())));

        s.role = Role::Auth;
        assert!(s.offers(&Command::RegisterService("Road Tax".into())));
        assert!(s.offers(&Command::OpenWallet(None)));
    }

    #[test]
    fn nothing_but_role_switches_without_a_role() {
        let s = session();
        assert!(s.offers(&Command::ChangeRole(Role::User)));
        assert!(!s.offers(&Command::Refresh));
        assert!(!s.offers(&Command::OpenWallet(None)));
    }

    #[test]
    fn parses_commands() {
        assert_eq!(
            "admin".parse::<Command>().unwrap(),
            Command::ChangeRole(Role::Admin)
        );
        assert_eq!(
            "pay Road Tax".parse::<Command>().unwrap(),
            Command::PayBill("Road Tax".into())
        );
        assert_eq!(
            "open  test test junk ".parse::<Command>().unwrap(),
            Command::OpenWallet(Some("test test junk".into()))
        );
        assert_eq!("open".parse::<Command>().unwrap(), Command::OpenWallet(None));
        assert_eq!("EXIT".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(matches!(
            "pay".parse::<Command>(),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            "transfer".parse::<Command>(),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!("".parse::<Command>(), Err(AppError::InvalidInput(_))));
    }
}

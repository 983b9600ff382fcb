//! Line-oriented front end: one command per line on stdin, the panel and
//! toasts printed to stdout.

use crate::managers::loans::LoanDesk;
use crate::managers::workflow::{ItemEdit, VoiceWorkflow, WorkflowCommand};
use crate::models::LocationId;
use crate::notifications::{Notifier, Toast};
use log::{debug, error, info};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tokio::sync::mpsc;

const HELP: &str = "\
commands:
  <enter> | toggle        start or stop recording
  start | stop | cancel   control the recording
  reset                   discard results and get ready again
  submit                  add the selected items
  name <n> <text>         rename item n
  zone|furniture|drawer <n> <id|->   set or clear a location level
  include <n> | exclude <n> | remove <n>
  items [temp]            list inventory items
  cart | uncart <n>       show or edit the borrow list
  borrow <DD/MM/YYYY>     borrow everything in the list
  loans | return <id>     list active loans, return one
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Workflow(WorkflowCommand),
    Items { temporary_only: bool },
    Cart,
    Uncart(usize),
    Borrow(String),
    Loans,
    Return(i64),
    Help,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("Unknown command '{0}', type 'help' for the list")]
    Unknown(String),

    #[error("'{command}' expects {expected}")]
    MissingArgument {
        command: String,
        expected: &'static str,
    },

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),
}

fn number<T: std::str::FromStr>(
    raw: Option<&str>,
    command: &str,
    expected: &'static str,
) -> Result<T, ParseCommandError> {
    let raw = raw.ok_or_else(|| ParseCommandError::MissingArgument {
        command: command.to_string(),
        expected,
    })?;
    raw.parse()
        .map_err(|_| ParseCommandError::InvalidNumber(raw.to_string()))
}

/// `-`, `none` or an empty value clear the level.
fn location(raw: Option<&str>, command: &str) -> Result<Option<LocationId>, ParseCommandError> {
    match raw {
        None | Some("-") | Some("none") => Ok(None),
        Some(_) => number(raw, command, "an item number and an id").map(Some),
    }
}

/// Parse one console line. Indices are the ones shown in the item list.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ParseCommandError> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();
    let command = head.to_lowercase();

    use WorkflowCommand as W;
    let parsed = match command.as_str() {
        "" | "toggle" | "t" => ConsoleCommand::Workflow(W::Toggle),
        "start" => ConsoleCommand::Workflow(W::Start),
        "stop" => ConsoleCommand::Workflow(W::Stop),
        "cancel" => ConsoleCommand::Workflow(W::Cancel),
        "reset" => ConsoleCommand::Workflow(W::Reset),
        "submit" | "confirm" => ConsoleCommand::Workflow(W::Submit),
        "quit" | "exit" | "q" => ConsoleCommand::Workflow(W::Quit),
        "name" => {
            let index = number(args.next(), &command, "an item number and a name")?;
            let name = rest
                .split_once(char::is_whitespace)
                .map(|(_, name)| name.trim().to_string())
                .unwrap_or_default();
            ConsoleCommand::Workflow(W::Edit(ItemEdit::Name(index, name)))
        }
        "zone" | "furniture" | "drawer" => {
            let index = number(args.next(), &command, "an item number and an id")?;
            let id = location(args.next(), &command)?;
            let edit = match command.as_str() {
                "zone" => ItemEdit::Zone(index, id),
                "furniture" => ItemEdit::Furniture(index, id),
                _ => ItemEdit::Drawer(index, id),
            };
            ConsoleCommand::Workflow(W::Edit(edit))
        }
        "include" | "exclude" => {
            let index = number(args.next(), &command, "an item number")?;
            ConsoleCommand::Workflow(W::Edit(ItemEdit::Included(index, command == "include")))
        }
        "remove" => {
            let index = number(args.next(), &command, "an item number")?;
            ConsoleCommand::Workflow(W::Edit(ItemEdit::Remove(index)))
        }
        "items" => ConsoleCommand::Items {
            temporary_only: matches!(args.next(), Some("temp") | Some("temporary")),
        },
        "cart" => ConsoleCommand::Cart,
        "uncart" => ConsoleCommand::Uncart(number(args.next(), &command, "a cart position")?),
        "borrow" => ConsoleCommand::Borrow(args.next().unwrap_or_default().to_string()),
        "loans" => ConsoleCommand::Loans,
        "return" => ConsoleCommand::Return(number(args.next(), &command, "a loan id")?),
        "help" | "?" => ConsoleCommand::Help,
        _ => return Err(ParseCommandError::Unknown(head.to_string())),
    };
    Ok(parsed)
}

/// Prints toasts as they arrive.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        debug!("toast {:?}", toast);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(
            stdout,
            "  <{}> {}: {}",
            toast.level.as_str(),
            toast.title,
            toast.message
        );
        let _ = stdout.flush();
    }
}

/// Forward stdin lines on a plain thread; blocking reads have no place on
/// the runtime.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    let spawned = std::thread::Builder::new()
        .name("console-input".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        });
    if let Err(e) = spawned {
        error!("Failed to start the console reader: {}", e);
    }
    rx
}

async fn dispatch(desk: &LoanDesk, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Workflow(_) => {}
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Items { temporary_only } => {
            if let Ok(items) = desk.items(temporary_only).await {
                println!("  {} item(s)", items.len());
                for item in items {
                    let id = item.id.map(|i| i.to_string()).unwrap_or_else(|| "-".into());
                    let kind = if item.is_temporary { " (temporary)" } else { "" };
                    println!("  #{} {}{}", id, item.name, kind);
                }
            }
        }
        ConsoleCommand::Cart => {
            let entries = desk.cart();
            if entries.is_empty() {
                println!("  borrow list is empty");
            }
            for (index, entry) in entries.iter().enumerate() {
                println!("  {} {} [{}] {}", index, entry.name, entry.kind.wire_name(), entry.location);
            }
        }
        ConsoleCommand::Uncart(index) => match desk.remove_from_cart(index) {
            Some(entry) => println!("  removed {}", entry.name),
            None => println!("  no cart entry at {}", index),
        },
        ConsoleCommand::Borrow(date) => {
            desk.borrow(&date).await;
        }
        ConsoleCommand::Loans => {
            if let Ok(loans) = desk.active_loans().await {
                println!("  {} active loan(s)", loans.len());
                for loan in loans {
                    println!(
                        "  #{} {} until {}",
                        loan.id,
                        loan.item_name,
                        loan.expected_return_date.as_deref().unwrap_or("?")
                    );
                }
            }
        }
        ConsoleCommand::Return(id) => {
            let _ = desk.return_loan(id).await;
        }
    }
}

/// Drive `workflow` from stdin until `quit` or end of input.
pub async fn run_console(workflow: &mut VoiceWorkflow, desk: &LoanDesk) {
    workflow.set_observer(Box::new(|view| print!("{}", view)));
    println!("{}", HELP);

    let (commands, receiver) = mpsc::channel(16);
    let mut lines = spawn_stdin_reader();

    let input = async move {
        while let Some(line) = lines.recv().await {
            match parse_command(&line) {
                Ok(ConsoleCommand::Workflow(command)) => {
                    let quit = command == WorkflowCommand::Quit;
                    if commands.send(command).await.is_err() || quit {
                        break;
                    }
                }
                Ok(other) => dispatch(desk, other).await,
                Err(e) => println!("  {}", e),
            }
        }
        info!("Console input finished");
    };

    tokio::join!(workflow.run(receiver), input);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_toggles() {
        assert_eq!(
            parse_command("  "),
            Ok(ConsoleCommand::Workflow(WorkflowCommand::Toggle))
        );
        assert_eq!(
            parse_command("STOP"),
            Ok(ConsoleCommand::Workflow(WorkflowCommand::Stop))
        );
    }

    #[test]
    fn test_name_keeps_spaces() {
        assert_eq!(
            parse_command("name 2 clé à molette"),
            Ok(ConsoleCommand::Workflow(WorkflowCommand::Edit(
                ItemEdit::Name(2, "clé à molette".into())
            )))
        );
    }

    #[test]
    fn test_location_edits() {
        assert_eq!(
            parse_command("zone 0 3"),
            Ok(ConsoleCommand::Workflow(WorkflowCommand::Edit(
                ItemEdit::Zone(0, Some(3))
            )))
        );
        assert_eq!(
            parse_command("drawer 1 -"),
            Ok(ConsoleCommand::Workflow(WorkflowCommand::Edit(
                ItemEdit::Drawer(1, None)
            )))
        );
        assert_eq!(
            parse_command("furniture 1 x"),
            Err(ParseCommandError::InvalidNumber("x".into()))
        );
    }

    #[test]
    fn test_loan_commands() {
        assert_eq!(
            parse_command("borrow 01/11/2026"),
            Ok(ConsoleCommand::Borrow("01/11/2026".into()))
        );
        assert_eq!(parse_command("return 12"), Ok(ConsoleCommand::Return(12)));
        assert_eq!(
            parse_command("items temp"),
            Ok(ConsoleCommand::Items {
                temporary_only: true
            })
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            parse_command("dance"),
            Err(ParseCommandError::Unknown("dance".into()))
        );
        assert!(matches!(
            parse_command("remove"),
            Err(ParseCommandError::MissingArgument { .. })
        ));
    }
}

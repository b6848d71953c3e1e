//! Interactive numbered menu over the four greeting calls.

use std::io::Write;
use std::ops::ControlFlow;
use std::str::FromStr;

use duplex::{CancellationToken, SessionDriver};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

use crate::error::GreeterError;
use crate::grpc::GreeterClient;

/// One entry of the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Hello,
    ServerStream,
    ClientStream,
    BiStreams,
    Exit,
}

#[derive(Debug, Error)]
#[error("unknown choice '{0}'")]
pub struct UnknownChoice(String);

impl FromStr for MenuChoice {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(MenuChoice::Hello),
            "2" => Ok(MenuChoice::ServerStream),
            "3" => Ok(MenuChoice::ClientStream),
            "4" => Ok(MenuChoice::BiStreams),
            "5" => Ok(MenuChoice::Exit),
            other => Err(UnknownChoice(other.to_string())),
        }
    }
}

const MENU: &str = "\
1: send Request
2: HelloServerStream Method
3: HelloClientStream Method
4: HelloBiStream Method
5: exit";

/// Line-oriented input plus the writer results are printed to.
///
/// Cancelling the interrupt token ends input and aborts a running
/// bidirectional session.
#[derive(Debug)]
pub struct Console<R, W> {
    input: Lines<R>,
    output: W,
    interrupt: CancellationToken,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(reader: R, output: W) -> Self {
        Self {
            input: reader.lines(),
            output,
            interrupt: CancellationToken::new(),
        }
    }

    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    async fn prompt(&mut self, text: &str) -> Result<Option<String>, GreeterError> {
        writeln!(self.output, "{text}")?;
        self.output.flush()?;
        self.next_line().await
    }

    /// Next input line, or `None` once input ends or is interrupted.
    async fn next_line(&mut self) -> Result<Option<String>, GreeterError> {
        tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => Ok(None),
            line = self.input.next_line() => Ok(line?),
        }
    }

    /// Read up to `count` lines, fewer if input ends.
    async fn read_names(&mut self, count: usize) -> Result<Vec<String>, GreeterError> {
        let mut names = Vec::with_capacity(count);
        while names.len() < count {
            match self.next_line().await? {
                Some(name) => names.push(name),
                None => break,
            }
        }
        Ok(names)
    }
}

/// Show the menu and run choices until the user exits, input ends or the
/// console is interrupted.
///
/// Call failures are printed and the menu continues; only console I/O
/// failures are returned.
pub async fn run_menu<R, W>(
    client: &mut GreeterClient,
    console: &mut Console<R, W>,
) -> Result<(), GreeterError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        writeln!(console.output, "{MENU}")?;
        write!(console.output, "please enter >")?;
        console.output.flush()?;

        let Some(line) = console.next_line().await? else {
            writeln!(console.output)?;
            return Ok(());
        };

        let choice = match line.parse::<MenuChoice>() {
            Ok(choice) => choice,
            Err(e) => {
                writeln!(console.output, "{e}")?;
                continue;
            }
        };

        if let ControlFlow::Break(()) = dispatch(client, console, choice).await? {
            return Ok(());
        }
    }
}

async fn dispatch<R, W>(
    client: &mut GreeterClient,
    console: &mut Console<R, W>,
    choice: MenuChoice,
) -> Result<ControlFlow<()>, GreeterError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let count = client.config().send_count;

    match choice {
        MenuChoice::Hello => {
            let Some(name) = console.prompt("Please enter your name.").await? else {
                return Ok(ControlFlow::Break(()));
            };
            match client.hello(name).await {
                Ok(message) => writeln!(console.output, "{message}")?,
                Err(e) => writeln!(console.output, "{e}")?,
            }
        }
        MenuChoice::ServerStream => {
            let Some(name) = console.prompt("Please enter your name.").await? else {
                return Ok(ControlFlow::Break(()));
            };
            let output = &mut console.output;
            let result = client
                .hello_server_stream(name, |message| print_response(output, &message))
                .await;
            match result {
                Ok(_) => writeln!(console.output, "all the responses have already received.")?,
                Err(e) => writeln!(console.output, "{e}")?,
            }
        }
        MenuChoice::ClientStream => {
            writeln!(console.output, "Please enter {count} names.")?;
            let names = console.read_names(count).await?;
            match client.hello_client_stream(names).await {
                Ok(message) => writeln!(console.output, "{message}")?,
                Err(e) => writeln!(console.output, "{e}")?,
            }
        }
        MenuChoice::BiStreams => {
            writeln!(console.output, "Please enter {count} names.")?;
            console.output.flush()?;

            let driver = SessionDriver::new(client.config().driver_config())
                .with_cancellation(console.interrupt.child_token());
            let Console { input, output, .. } = &mut *console;
            let names = async_stream::stream! {
                loop {
                    match input.next_line().await {
                        Ok(Some(name)) => yield name,
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "Failed to read name");
                            break;
                        }
                    }
                }
            };

            let result = client
                .hello_bi_streams_with(driver, names, |message| print_response(output, &message))
                .await;

            match result {
                Ok(report) => {
                    for e in report.errors() {
                        writeln!(console.output, "{e}")?;
                    }
                }
                Err(e) => writeln!(console.output, "{e}")?,
            }
        }
        MenuChoice::Exit => {
            writeln!(console.output, "bye.")?;
            return Ok(ControlFlow::Break(()));
        }
    }

    Ok(ControlFlow::Continue(()))
}

/// Print one streamed response as soon as it arrives.
fn print_response<W: Write>(output: &mut W, message: &str) {
    if let Err(e) = writeln!(output, "{message}").and_then(|()| output.flush()) {
        warn!(error = %e, "Failed to print response");
    }
}

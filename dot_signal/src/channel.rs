//! The command queue between input classifiers and the render loop.

use std::sync::mpsc::{self, Receiver, Sender};

use dot_state::Command;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("command channel closed")]
pub struct ChannelClosed;

/// Producer half.  Cheap to clone; one clone per classifier.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    /// Enqueue without blocking.  Fails only once the receiver is gone.
    pub fn send(&self, cmd: Command) -> Result<(), ChannelClosed> {
        self.tx.send(cmd).map_err(|_| ChannelClosed)
    }
}

/// Consumer half, owned by the render loop.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: Receiver<Command>,
}

impl CommandReceiver {
    /// Every command queued right now, in arrival order.  Never blocks.
    pub fn drain(&self) -> impl Iterator<Item = Command> + '_ {
        self.rx.try_iter()
    }
}

/// Create an unbounded command queue.
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn drain_empties_in_arrival_order() {
        let (tx, rx) = command_channel();
        tx.send(Command::Grow).unwrap();
        tx.send(Command::Toggle).unwrap();
        tx.send(Command::Shrink).unwrap();
        let got: Vec<_> = rx.drain().collect();
        assert_eq!(got, [Command::Grow, Command::Toggle, Command::Shrink]);
        assert_eq!(rx.drain().count(), 0);
    }

    #[test]
    fn drain_on_empty_queue_returns_nothing() {
        let (_tx, rx) = command_channel();
        assert_eq!(rx.drain().next(), None);
    }

    #[test]
    fn many_producers_lose_nothing() {
        let (tx, rx) = command_channel();
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for _ in 0..250 { tx.send(Command::Toggle).unwrap(); }
                })
            })
            .collect();
        for p in producers { p.join().unwrap(); }
        assert_eq!(rx.drain().count(), 1000);
    }

    #[test]
    fn queued_commands_survive_every_sender_dropping() {
        let (tx, rx) = command_channel();
        tx.send(Command::Shrink).unwrap();
        drop(tx);
        assert_eq!(rx.drain().collect::<Vec<_>>(), [Command::Shrink]);
        assert_eq!(rx.drain().next(), None);
    }

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (tx, rx) = command_channel();
        drop(rx);
        assert_eq!(tx.send(Command::Grow), Err(ChannelClosed));
    }
}

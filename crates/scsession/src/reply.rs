//! Reply pump: a background thread that drains scsynth's reply socket
//! and demultiplexes messages to persistent subscribers (`on`/`off`,
//! for long-lived notifications like `/n_go`/`/n_end`) and one-shot
//! waiters (`wait_for`, for correlating a command with its `/done` or
//! `/fail`).
//!
//! The teacher never needed this: `OscClient::recv_msg` is called
//! synchronously, inline, right after whichever command expects a
//! reply. spec.md's session layer instead keeps the engine's reply
//! socket continuously drained in the background (so unsolicited
//! `/n_end` notifications are never missed while nothing happens to be
//! waiting), which is new relative to the teacher and grounded only on
//! the general producer/consumer channel pattern `crossbeam-channel`
//! is built for.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use rosc::OscMessage;

use crate::errors::{Result, SessionError};
use crate::osc::OscClient;

type Subscriber = (String, Sender<OscMessage>);

/// Drains an [`OscClient`] on a background thread and fans messages out
/// to interested listeners.
pub struct ReplyPump {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    waiters: Arc<Mutex<Vec<Subscriber>>>,
}

impl ReplyPump {
    pub fn start(osc: OscClient) -> ReplyPump {
        let running = Arc::new(AtomicBool::new(true));
        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));
        let waiters: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));

        let thread_running = running.clone();
        let thread_subscribers = subscribers.clone();
        let thread_waiters = waiters.clone();
        let handle = std::thread::spawn(move || {
            while thread_running.load(Ordering::Acquire) {
                match osc.try_recv() {
                    Ok(Some(msg)) => dispatch(&thread_waiters, &thread_subscribers, msg),
                    Ok(None) => std::thread::sleep(Duration::from_millis(1)),
                    Err(_) => std::thread::sleep(Duration::from_millis(5)),
                }
            }
        });

        ReplyPump { running, handle: Some(handle), subscribers, waiters }
    }

    /// Subscribe to every reply whose address starts with `prefix`.
    /// Drop the returned receiver to unsubscribe (the next failed send
    /// prunes it).
    pub fn on(&self, prefix: &str) -> Receiver<OscMessage> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().expect("subscribers lock poisoned").push((prefix.to_string(), tx));
        rx
    }

    /// Block until a message whose address starts with `prefix` arrives,
    /// or `timeout` elapses.
    pub fn wait_for(&self, prefix: &str, timeout: Duration) -> Result<OscMessage> {
        let (tx, rx) = unbounded();
        self.waiters.lock().expect("waiters lock poisoned").push((prefix.to_string(), tx));
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.waiters.lock().expect("waiters lock poisoned").retain(|(p, _)| p != prefix);
                return Err(SessionError::ReplyTimeout(prefix.to_string()));
            }
            match rx.recv_timeout(remaining) {
                Ok(msg) => return Ok(msg),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(SessionError::ReplyTimeout(prefix.to_string()))
                }
            }
        }
    }
}

fn dispatch(waiters: &Arc<Mutex<Vec<Subscriber>>>, subscribers: &Arc<Mutex<Vec<Subscriber>>>, msg: OscMessage) {
    {
        let mut w = waiters.lock().expect("waiters lock poisoned");
        let mut fired = Vec::new();
        w.retain(|(prefix, tx)| {
            if msg.addr.starts_with(prefix.as_str()) {
                fired.push(tx.clone());
                false
            } else {
                true
            }
        });
        for tx in fired {
            let _ = tx.send(msg.clone());
        }
    }
    {
        let mut s = subscribers.lock().expect("subscribers lock poisoned");
        s.retain(|(prefix, tx)| {
            if msg.addr.starts_with(prefix.as_str()) {
                tx.send(msg.clone()).is_ok()
            } else {
                true
            }
        });
    }
}

impl Drop for ReplyPump {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_routes_by_address_prefix() {
        let waiters = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = unbounded();
        subscribers.lock().unwrap().push(("/n_".to_string(), tx));

        dispatch(&waiters, &subscribers, OscMessage { addr: "/n_go".to_string(), args: vec![] });
        dispatch(&waiters, &subscribers, OscMessage { addr: "/status.reply".to_string(), args: vec![] });

        let received = rx.try_recv().unwrap();
        assert_eq!(received.addr, "/n_go");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn waiter_fires_once_and_is_removed() {
        let waiters = Arc::new(Mutex::new(Vec::new()));
        let subscribers = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = unbounded();
        waiters.lock().unwrap().push(("/done".to_string(), tx));

        dispatch(&waiters, &subscribers, OscMessage { addr: "/done".to_string(), args: vec![] });
        assert!(rx.try_recv().is_ok());
        assert!(waiters.lock().unwrap().is_empty());
    }

    #[test]
    fn wait_for_times_out_when_nothing_arrives() {
        let pump = ReplyPump::start(OscClient::connect("127.0.0.1:1").unwrap());
        let result = pump.wait_for("/done", Duration::from_millis(20));
        assert!(matches!(result, Err(SessionError::ReplyTimeout(_))));
    }
}

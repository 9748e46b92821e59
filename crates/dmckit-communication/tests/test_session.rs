use dmckit_communication::{DmcSession, RetryPolicy, Transport};
use dmckit_core::DmcError;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

// Scripted transport for session-level tests: canned replies per command,
// programmable failures, and a shared log of everything sent.
#[derive(Default)]
struct ScriptedTransport {
    connected: bool,
    sent: Arc<Mutex<Vec<String>>>,
    responses: HashMap<String, String>,
    fail: HashSet<String>,
    tc1_fails: bool,
}

impl ScriptedTransport {
    fn new() -> Self {
        let mut t = Self::default();
        t.responses
            .insert("TC1".to_string(), "21 Command not valid".to_string());
        t
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, _address: &str) -> dmckit_core::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send_and_receive(&mut self, line: &str, _retry: RetryPolicy) -> dmckit_core::Result<String> {
        self.sent.lock().unwrap().push(line.to_string());
        if line == "TC1" && self.tc1_fails {
            return Err(DmcError::comm("wire dropped"));
        }
        if self.fail.contains(line) {
            return Err(DmcError::comm("wire dropped"));
        }
        Ok(self
            .responses
            .get(line)
            .cloned()
            .unwrap_or_else(|| "0.0000".to_string()))
    }
}

fn observed_session(transport: ScriptedTransport) -> (DmcSession, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let mut session = DmcSession::new(Box::new(transport));
    session.set_observer(Some(Arc::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    })));
    (session, log)
}

#[test]
fn execute_returns_reply_and_notifies_observer() {
    let mut transport = ScriptedTransport::new();
    transport
        .responses
        .insert("MG X".to_string(), " 1.0000\r\n".to_string());
    let (mut session, log) = observed_session(transport);

    session.connect("192.168.0.42 -d").unwrap();
    let reply = session.execute("MG X").unwrap();
    assert_eq!(reply.trim(), "1.0000");

    let lines = log.lock().unwrap();
    assert!(lines.iter().any(|l| l == "Connected to 192.168.0.42 -d"));
    assert!(lines.iter().any(|l| l == "CMD MG X -> 1.0000"));
}

#[test]
fn execute_without_connection_fails_fast() {
    let transport = ScriptedTransport::new();
    let sent = transport.sent.clone();
    let mut session = DmcSession::new(Box::new(transport));

    let err = session.execute("MG X").unwrap_err();
    assert!(matches!(err, DmcError::NotConnected));
    assert!(sent.lock().unwrap().is_empty());
}

#[test]
fn failure_is_enriched_with_tc1_diagnostic() {
    let mut transport = ScriptedTransport::new();
    transport.fail.insert("BADCMD".to_string());
    let sent = transport.sent.clone();
    let (mut session, log) = observed_session(transport);

    session.connect("FAKE").unwrap();
    let err = session.execute("BADCMD").unwrap_err();
    match err {
        DmcError::CommandFailed {
            command,
            diagnostic,
        } => {
            assert_eq!(command, "BADCMD");
            assert_eq!(diagnostic, "21 Command not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let sent = sent.lock().unwrap();
    assert_eq!(sent.as_slice(), ["BADCMD", "TC1"]);
    let lines = log.lock().unwrap();
    assert!(lines.iter().any(|l| l == "Error: 21 Command not valid"));
}

#[test]
fn diagnostic_failure_keeps_original_error_text() {
    let mut transport = ScriptedTransport::new();
    transport.fail.insert("BADCMD".to_string());
    transport.tc1_fails = true;
    let (mut session, _log) = observed_session(transport);

    session.connect("FAKE").unwrap();
    let err = session.execute("BADCMD").unwrap_err();
    match err {
        DmcError::CommandFailed { diagnostic, .. } => {
            assert!(diagnostic.contains("wire dropped"), "got: {diagnostic}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn silent_path_produces_no_observer_traffic() {
    let (mut session, log) = observed_session(ScriptedTransport::new());
    session.connect("FAKE").unwrap();
    log.lock().unwrap().clear();

    session.execute_silent("MG X").unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn observer_panic_does_not_propagate() {
    let mut session = DmcSession::new(Box::new(ScriptedTransport::new()));
    session.set_observer(Some(Arc::new(|_: &str| panic!("misbehaving sink"))));

    session.connect("FAKE").unwrap();
    assert!(session.execute("MG X").is_ok());
}

#[test]
fn read_status_builds_snapshot_with_speed() {
    let mut transport = ScriptedTransport::new();
    transport.responses.insert(
        "MG{Z10.0} _RPA, _RPB, _RPC, _RPD, _TSA".to_string(),
        " 100.0, 200.0, -3.5, 0.0, 140.0\r\n".to_string(),
    );
    transport
        .responses
        .insert("MG{Z10.0} _SPA".to_string(), "2500.0".to_string());
    let mut session = DmcSession::new(Box::new(transport));

    session.connect("FAKE").unwrap();
    let status = session.read_status().unwrap();
    assert_eq!(status.positions, [100.0, 200.0, -3.5, 0.0]);
    assert_eq!(status.status_bits, 140);
    assert_eq!(status.speed, 2500.0);
    assert!(status.in_motion());
}

#[test]
fn speed_read_failure_degrades_to_zero() {
    let mut transport = ScriptedTransport::new();
    transport.fail.insert("MG{Z10.0} _SPA".to_string());
    let mut session = DmcSession::new(Box::new(transport));

    session.connect("FAKE").unwrap();
    let status = session.read_status().unwrap();
    assert_eq!(status.speed, 0.0);
}

#[test]
fn disconnect_then_reconnect() {
    let mut session = DmcSession::new(Box::new(ScriptedTransport::new()));
    session.connect("FAKE").unwrap();
    assert!(session.is_connected());

    session.disconnect();
    assert!(!session.is_connected());
    assert!(matches!(
        session.execute("MG X").unwrap_err(),
        DmcError::NotConnected
    ));

    session.connect("FAKE").unwrap();
    assert!(session.execute("MG X").is_ok());
}

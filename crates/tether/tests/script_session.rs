//! End-to-end flows through the public session API.
#![cfg(feature = "test-support")]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use tether::testing::ScriptedHost;
use tether::{CallbackError, Host, Memory, MemoryError, Message, NativePointer, Session};

/// Byte arena addressed from a fixed base, standing in for host memory.
#[derive(Default)]
struct ArenaMemory {
    bytes: RefCell<Vec<u8>>,
}

impl ArenaMemory {
    const BASE: u64 = 0x1000;

    fn with_contents(contents: &[u8]) -> Self {
        Self {
            bytes: RefCell::new(contents.to_vec()),
        }
    }

    fn offset(&self, pointer: NativePointer, size: usize) -> Result<usize, MemoryError> {
        let start = pointer
            .address()
            .checked_sub(Self::BASE)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(MemoryError::Access {
                address: pointer,
                size,
            })?;
        if start + size > self.bytes.borrow().len() {
            return Err(MemoryError::Access {
                address: pointer,
                size,
            });
        }
        Ok(start)
    }

    fn read(&self, pointer: NativePointer, size: usize) -> Vec<u8> {
        let start = self.offset(pointer, size).expect("readable region");
        self.bytes
            .borrow()
            .get(start..start + size)
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }
}

impl Memory for ArenaMemory {
    fn alloc(&self, size: usize) -> Result<NativePointer, MemoryError> {
        let mut bytes = self.bytes.borrow_mut();
        let len = bytes.len();
        let start = u64::try_from(len).map_err(|_| MemoryError::Allocation { size })?;
        bytes.resize(len + size, 0);
        Ok(NativePointer::new(Self::BASE + start))
    }

    fn copy(
        &self,
        destination: NativePointer,
        source: NativePointer,
        size: usize,
    ) -> Result<(), MemoryError> {
        let from = self.offset(source, size)?;
        let to = self.offset(destination, size)?;
        self.bytes.borrow_mut().copy_within(from..from + size, to);
        Ok(())
    }
}

fn session_with(host: &Rc<ScriptedHost>, memory: Rc<ArenaMemory>) -> Session {
    Session::new(Rc::clone(host) as Rc<dyn Host>, memory)
}

#[test]
fn script_answers_each_request_in_turn() {
    let host = ScriptedHost::new();
    let session = Rc::new(session_with(&host, Rc::new(ArenaMemory::default())));
    host.schedule(json!({"type": "request", "payload": 1}).to_string());
    host.schedule(json!({"type": "request", "payload": 2}).to_string());

    for _ in 0..2 {
        let responder = Rc::clone(&session);
        let pending = session
            .recv_type("request", move |message: Message| {
                let value = message.payload().and_then(Value::as_i64).unwrap_or_default();
                responder
                    .send(&json!({"doubled": value * 2}), None)
                    .map_err(|error| CallbackError::with_source("reply failed", error))
            })
            .expect("register");
        pending.wait().expect("request arrives");
    }

    assert_eq!(
        host.sent_values(),
        vec![
            json!({"type": "send", "payload": {"doubled": 2}}),
            json!({"type": "send", "payload": {"doubled": 4}}),
        ]
    );
    assert_eq!(session.dispatcher().queued_len(), 0);
}

#[test]
fn wildcard_catches_unclaimed_types_while_waiting() {
    let host = ScriptedHost::new();
    let session = session_with(&host, Rc::new(ArenaMemory::default()));
    let kinds = Rc::new(RefCell::new(Vec::new()));
    host.schedule(json!({"type": "stray"}).to_string());
    host.schedule(json!({"type": "ready"}).to_string());

    let sink = Rc::clone(&kinds);
    let any = session
        .recv(move |message: Message| {
            sink.borrow_mut().push(message.kind().to_owned());
            Ok(())
        })
        .expect("register wildcard");
    let sink = Rc::clone(&kinds);
    let ready = session
        .recv_type("ready", move |message: Message| {
            sink.borrow_mut().push(message.kind().to_owned());
            Ok(())
        })
        .expect("register ready");

    ready.wait().expect("ready arrives");

    assert!(any.is_completed());
    assert_eq!(
        *kinds.borrow(),
        vec![String::from("stray"), String::from("ready")]
    );
}

#[test]
fn logs_and_staged_buffers_reach_the_host() {
    let host = ScriptedHost::new();
    let memory = Rc::new(ArenaMemory::with_contents(b"payload"));
    let session = session_with(&host, Rc::clone(&memory));

    let source = Session::ptr("0x1000").expect("pointer parses");
    let copy = session.duplicate(source, 7).expect("duplicate succeeds");
    assert_ne!(copy, source);
    let staged = memory.read(copy, 7);
    assert_eq!(staged, b"payload");

    session
        .send(&json!({"staged": copy.to_string()}), Some(&staged))
        .expect("send succeeds");
    session.log(["staged", "7", "bytes"]).expect("log succeeds");

    let sent = host.sent();
    assert_eq!(sent.len(), 2);
    let first = sent.first().expect("send envelope recorded");
    assert_eq!(first.data.as_deref(), Some(&b"payload"[..]));
    assert_eq!(
        host.sent_values().last(),
        Some(&json!({"type": "log", "payload": "staged 7 bytes"}))
    );
}

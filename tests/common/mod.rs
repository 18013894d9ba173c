#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rlox::Lox;

/// In-memory sink that can be handed to a session and read back afterwards.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is UTF-8")
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A session wired to two in-memory sinks.
pub struct Harness {
    pub lox: Lox,
    pub out: SharedBuf,
    pub err: SharedBuf,
}

impl Harness {
    pub fn new() -> Self {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let lox = Lox::with_sinks(Box::new(out.clone()), Box::new(err.clone()));

        Self { lox, out, err }
    }

    pub fn run(&mut self, source: &str) -> &mut Self {
        self.lox.run(source).expect("in-memory sinks do not fail");
        self
    }

    pub fn stdout(&self) -> String {
        self.out.contents()
    }

    pub fn stderr(&self) -> String {
        self.err.contents()
    }
}

/// Run `source` in a fresh session.
pub fn run(source: &str) -> Harness {
    let mut harness = Harness::new();
    harness.run(source);
    harness
}

/// Printed output of a program expected to run cleanly.
pub fn output_of(source: &str) -> String {
    let harness = run(source);

    assert_eq!(harness.stderr(), "", "unexpected diagnostics");
    assert_eq!(harness.lox.exit_code(), None);

    harness.stdout()
}

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::error::LoxError;

/// In-memory output sink whose contents stay readable after the
/// interpreter that owns the boxed writer is gone.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `source`, returning the outcome and everything printed.
pub fn run_capture(source: &str) -> (Result<(), LoxError>, String) {
    let buffer = SharedBuffer::default();
    let result = rox::run(source, Box::new(buffer.clone()));
    (result, buffer.contents())
}

/// Output of a program expected to succeed.
pub fn output(source: &str) -> String {
    let (result, printed) = run_capture(source);
    if let Err(e) = result {
        panic!("program failed: {}\noutput so far:\n{}", e, printed);
    }
    printed
}

/// Error of a program expected to fail.
pub fn run_error(source: &str) -> LoxError {
    match run_capture(source) {
        (Err(e), _) => e,
        (Ok(()), printed) => panic!("program succeeded with output:\n{}", printed),
    }
}

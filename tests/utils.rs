use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};

use conker::{run_code_with_output, RuntimeError, TaskResults, Value};

/// A `$out` sink shared between the runtime and the test.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run a program, returning task outcomes and everything `$out` emitted.
#[allow(dead_code)]
pub fn run_capturing(input: &str) -> (TaskResults, String) {
    let output = CapturedOutput::default();
    let results =
        run_code_with_output(input, Box::new(output.clone())).expect("program should parse");
    (results, output.contents())
}

#[allow(dead_code)]
pub fn run_tasks(input: &str) -> TaskResults {
    run_capturing(input).0
}

#[allow(dead_code)]
pub fn run_one_task(input: &str) -> Result<Value, RuntimeError> {
    run_tasks(input).into_iter().next().unwrap().1
}

#[allow(dead_code)]
pub fn run_one_expression(input: &str) -> Result<Value, RuntimeError> {
    run_one_task(&format!("task Eval\n    {input}\n"))
}

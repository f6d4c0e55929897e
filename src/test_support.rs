//! Scripted host runner and deterministic ids for unit tests

use crate::error::Result;
use crate::exec::{command_line, CommandOutput, CommandRunner, IdSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Hook = Box<dyn Fn(&[String]) + Send + Sync>;

enum Matcher {
    Exact(String),
    Prefix(String),
}

impl Matcher {
    fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Exact(expected) => line == expected,
            Matcher::Prefix(prefix) => line.starts_with(prefix.as_str()),
        }
    }
}

/// Records every command and replays scripted outputs.
///
/// Commands without a scripted response succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    responses: Mutex<Vec<(Matcher, CommandOutput)>>,
    calls: Mutex<Vec<Vec<String>>>,
    hook: Mutex<Option<Hook>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failure(stderr: &str) -> CommandOutput {
        CommandOutput {
            status: 1,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Script the output for an exact command line, as rendered by `command_line`
    pub fn respond(&self, line: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((Matcher::Exact(line.to_string()), output));
    }

    /// Script the output for every command line starting with `prefix`
    pub fn respond_prefix(&self, prefix: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((Matcher::Prefix(prefix.to_string()), output));
    }

    /// Run `hook` with the argv of each command as it executes
    pub fn on_run(&self, hook: impl Fn(&[String]) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Command lines issued so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|argv| {
                let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
                command_line(&argv[0], &args)
            })
            .collect()
    }

    /// Raw argv of every command issued so far
    pub fn argvs(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut argv = vec![program.to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));

        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(&argv);
        }
        self.calls.lock().unwrap().push(argv);

        let line = command_line(program, args);
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .find(|(matcher, _)| matcher.matches(&line))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

/// Ids `disk-1`, `disk-2`, ... in order
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl IdSource for SequentialIds {
    fn mint(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("disk-{}", n)
    }
}

/// Always the same id, for asserting exact command lines
pub struct FixedId(pub &'static str);

impl IdSource for FixedId {
    fn mint(&self) -> String {
        self.0.to_string()
    }
}

use crate::utils::pprint::PrettyPrint;

use std::time;

pub struct DebugEnv {
    debug: bool,
    start: time::Instant,
}

impl DebugEnv {
    pub fn print<T: PrettyPrint>(&self, msg: &str, ast: &T) {
        if self.debug {
            self.emit(msg, ast.pprint_default());
        }
    }

    // Front-end representations have no pretty printer of their own; their debug form is close
    // enough for pass-by-pass inspection.
    pub fn print_debug<T: std::fmt::Debug>(&self, msg: &str, ast: &T) {
        if self.debug {
            self.emit(msg, format!("{ast:#?}"));
        }
    }

    fn emit(&self, msg: &str, body: String) {
        let now = time::Instant::now();
        let t = now.duration_since(self.start).as_micros();
        let bounds = "=".repeat(5);
        println!("{0} {msg} (time: {t} us) {0}\n{body}", bounds);
    }
}

pub fn init(debug_flag: bool) -> DebugEnv {
    DebugEnv {debug: debug_flag, start: time::Instant::now()}
}

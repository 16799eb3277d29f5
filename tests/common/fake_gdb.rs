//! A shell script that answers GDB/MI commands the way gdb does
//!
//! Each `-exec-run` or `-exec-continue` plays the next scripted stop. Commands
//! are appended to `commands.log` next to the script, token stripped.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const HIT: &str = r#"*stopped,reason="breakpoint-hit",disp="keep",bkptno="1",frame={func="BREAK_HERE"},thread-id="1",stopped-threads="all""#;

fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Print `text` and a newline.
pub fn line(text: &str) -> String {
    format!("printf '%s\\n' {}", sh_quote(text))
}

/// Print `text` without a newline.
pub fn partial(text: &str) -> String {
    format!("printf '%s' {}", sh_quote(text))
}

/// Print a `printf` format verbatim, so octal escapes emit raw bytes.
pub fn raw(format: &str) -> String {
    format!("printf {}", sh_quote(format))
}

struct Stop {
    tag: String,
    commands: Vec<String>,
}

#[derive(Default)]
pub struct FakeGdb {
    replies: Vec<(String, String)>,
    stops: Vec<Stop>,
}

impl FakeGdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `command` with `reply` (without token).
    pub fn reply(mut self, command: &str, reply: &str) -> Self {
        self.replies.push((command.to_string(), reply.to_string()));
        self
    }

    /// A breakpoint hit whose marker argument is `tag`.
    pub fn hit(self, tag: &str) -> Self {
        self.stop(tag, vec![line(HIT)])
    }

    /// A stop that prints `commands` output; `tag` is what the marker
    /// argument reads as while stopped there.
    pub fn stop(mut self, tag: &str, commands: Vec<String>) -> Self {
        self.stops.push(Stop {
            tag: tag.to_string(),
            commands,
        });
        self
    }

    /// Write the script into `dir` and return its path.
    pub fn install(&self, dir: &Path) -> PathBuf {
        let log = dir.join("commands.log");
        let mut script = String::from("#!/bin/sh\nstop=0\ntag=''\n\nnext_stop() {\n");
        script.push_str("    stop=$((stop + 1))\n    case $stop in\n");
        for (idx, stop) in self.stops.iter().enumerate() {
            script.push_str(&format!("        {})\n", idx + 1));
            script.push_str(&format!("            tag={}\n", sh_quote(&stop.tag)));
            for command in &stop.commands {
                script.push_str(&format!("            {command}\n"));
            }
            script.push_str("            ;;\n");
        }
        script.push_str("        *)\n");
        script.push_str(&format!(
            "            {}\n",
            line(r#"*stopped,reason="exited-normally""#)
        ));
        script.push_str("            ;;\n    esac\n}\n\n");

        script.push_str("while IFS= read -r input; do\n");
        script.push_str("    token=${input%%[!0-9]*}\n");
        script.push_str("    command=${input#\"$token\"}\n");
        script.push_str(&format!(
            "    printf '%s\\n' \"$command\" >> {}\n",
            sh_quote(&log.display().to_string())
        ));
        script.push_str("    case $command in\n");
        for (command, reply) in &self.replies {
            script.push_str(&format!(
                "        {command}*)\n            printf '%s%s\\n' \"$token\" {}\n            ;;\n",
                sh_quote(reply)
            ));
        }
        script.push_str(
            r#"        -exec-run*|-exec-continue*)
            printf '%s\n' "${token}^running"
            next_stop
            ;;
        -gdb-exit*)
            printf '%s\n' "${token}^exit"
            exit 0
            ;;
        -break-insert*)
            printf '%s%s\n' "$token" '^done,bkpt={number="1",type="breakpoint",func="BREAK_HERE"}'
            ;;
        -stack-list-arguments*)
            printf '%s%s%s%s\n' "$token" '^done,stack-args=[frame={level="0",args=[{name="tag",value="0x4006f4 \"' "$tag" '\""}]}]'
            ;;
        -stack-info-depth*)
            printf '%s%s\n' "$token" '^done,depth="3"'
            ;;
        -stack-list-frames*)
            printf '%s%s\n' "$token" '^done,stack=[frame={level="1",func="test_vector_int"}]'
            ;;
        -stack-list-variables*)
            printf '%s%s\n' "$token" '^done,variables=[{name="v"}]'
            ;;
        -data-evaluate-expression*)
            printf '%s%s\n' "$token" '^done,value="42"'
            ;;
        *)
            printf '%s\n' "${token}^done"
            ;;
    esac
done
"#,
        );

        let path = dir.join("gdb");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}

/// Commands the script received, in order.
pub fn commands(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("commands.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

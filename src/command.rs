//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! POP3 request-line parsing
//!
//! A request line is a verb and up to two arguments, separated by single
//! spaces. Message numbers are 1-based on the wire and 0-based everywhere
//! inside the crate; the conversion happens here, exactly once, at parse
//! time. The parser does not validate verbs; the session dispatch rejects
//! anything it has no handler for.

/// One parsed request line.
///
/// Each argument carries a numeric companion. For the first argument (a
/// message number) the companion is the 0-based index when the argument is a
/// strictly positive decimal integer; zero, negative and non-numeric
/// arguments have no companion. The second argument (only TOP uses it, as a
/// body-line budget) is kept as a plain non-negative count, so `TOP n 0` is
/// representable.
#[derive(Debug, Clone, Default)]
pub(crate) struct Command {
    pub(crate) verb: String,
    pub(crate) args: Vec<String>,
    num_args: Vec<Option<usize>>,
}

impl Command {
    /// Parse a request line with the trailing CR/LF already stripped.
    pub(crate) fn parse(line: &str) -> Self {
        let mut parts = line.splitn(3, ' ');
        let verb = parts.next().unwrap_or_default().to_ascii_uppercase();
        let args: Vec<String> = parts.map(str::to_owned).collect();
        let num_args = args
            .iter()
            .enumerate()
            .map(|(position, arg)| numeric_companion(position, arg))
            .collect();
        Self {
            verb,
            args,
            num_args,
        }
    }

    /// Exactly one argument, parsed as a message index.
    pub(crate) fn one_num_arg(&self) -> Option<usize> {
        if self.args.len() == 1 {
            self.num_args[0]
        } else {
            None
        }
    }

    /// Exactly two numeric arguments: a message index and a count.
    pub(crate) fn two_num_args(&self) -> Option<(usize, usize)> {
        if self.args.len() == 2 {
            self.num_args[0].zip(self.num_args[1])
        } else {
            None
        }
    }
}

fn numeric_companion(position: usize, arg: &str) -> Option<usize> {
    let value: i64 = arg.parse().ok()?;
    if position == 0 {
        // 1-based wire message number to 0-based index
        if value > 0 {
            Some(value as usize - 1)
        } else {
            None
        }
    } else {
        usize::try_from(value).ok()
    }
}

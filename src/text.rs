/// Line buffer the denoiser and reconstructor work on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingText {
    lines: Vec<String>,
}

impl WorkingText {
    pub fn from_raw(raw: &str) -> Self {
        let lines = raw
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .split('\n')
            .map(str::to_string)
            .collect();
        WorkingText { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Drop every line matching `f`, returning the dropped lines in order.
    pub fn remove_where<F>(&mut self, f: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut removed = Vec::new();
        self.lines.retain(|line| {
            if f(line) {
                removed.push(line.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Rewrite every line in place; returns how many lines changed.
    pub fn map_lines<F>(&mut self, f: F) -> usize
    where
        F: Fn(&str) -> String,
    {
        let mut changed = 0;
        for line in self.lines.iter_mut() {
            let next = f(line);
            if next != *line {
                *line = next;
                changed += 1;
            }
        }
        changed
    }

    /// Fold every line accepted by `attach` into the line before it.
    /// `attach` returns the suffix to append, or `None` to keep the line.
    pub fn fold_into_previous<F>(&mut self, attach: F) -> usize
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out: Vec<String> = Vec::with_capacity(self.lines.len());
        let mut folded = 0;
        for line in self.lines.drain(..) {
            let suffix = if out.is_empty() { None } else { attach(&line) };
            match suffix {
                Some(suffix) => {
                    if let Some(prev) = out.last_mut() {
                        prev.push_str(&suffix);
                    }
                    folded += 1;
                }
                None => out.push(line),
            }
        }
        self.lines = out;
        folded
    }

    /// Collapse runs of at least `min_run` blank lines into a single blank line.
    pub fn squeeze_blank_runs(&mut self, min_run: usize) -> usize {
        let mut out: Vec<String> = Vec::with_capacity(self.lines.len());
        let mut run: Vec<String> = Vec::new();
        let mut squeezed = 0;
        for line in self.lines.drain(..).chain(std::iter::once("\0".to_string())) {
            if line.trim().is_empty() {
                run.push(line);
                continue;
            }
            if run.len() >= min_run {
                squeezed += run.len() - 1;
                out.push(String::new());
            } else {
                out.append(&mut run);
            }
            run.clear();
            out.push(line);
        }
        out.pop();
        self.lines = out;
        squeezed
    }

    pub fn into_text(self) -> String {
        self.lines.join("\n")
    }
}

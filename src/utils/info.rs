use itertools::Itertools;

#[derive(Clone, Debug, PartialEq)]
pub struct FilePos {
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

impl FilePos {
    pub fn new(line: usize, col: usize, offset: usize) -> FilePos {
        FilePos {line, col, offset}
    }

    pub fn min(l: FilePos, r: FilePos) -> FilePos {
        if l.offset <= r.offset { l } else { r }
    }

    pub fn max(l: FilePos, r: FilePos) -> FilePos {
        if l.offset >= r.offset { l } else { r }
    }
}

impl Default for FilePos {
    fn default() -> FilePos {
        FilePos {line: 0, col: 0, offset: 0}
    }
}

// The info field refers back to the area of the source text an AST node was parsed from. The
// source text itself is attached at the compile entry point, so error messages can include an
// excerpt of the offending lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Info {
    filename: String,
    start: FilePos,
    end: FilePos,
}

impl Info {
    pub fn new(fname: &str, start: FilePos, end: FilePos) -> Info {
        let filename = fname.to_string();
        Info {filename, start, end}
    }

    pub fn with_file(self, fname: &str) -> Info {
        Info {filename: fname.to_string(), ..self}
    }

    pub fn start_line(&self) -> usize {
        self.start.line
    }

    pub fn merge(l: Info, r: Info) -> Info {
        let filename = if l.filename == r.filename {
            l.filename.clone()
        } else {
            "<unknown>".to_string()
        };
        Info {
            filename,
            start: FilePos::min(l.start, r.start),
            end: FilePos::max(l.end, r.end),
        }
    }

    // Renders a message with the source excerpt when the referenced file is readable, falling
    // back to a plain location note otherwise (preprocessed buffers rarely exist on disk).
    pub fn error_msg(&self, msg: String) -> String {
        match std::fs::read_to_string(&self.filename) {
            Ok(code) => self.error_msg_src(msg, Some(&code)),
            Err(_) => self.error_msg_src(msg, None),
        }
    }

    pub fn error_msg_src(&self, msg: String, src: Option<&str>) -> String {
        match src {
            Some(code) if self.start.line > 0 => self.extract_lines(code, msg),
            _ if self.start.line > 0 => {
                format!(
                    "{msg}\n\nOn line {0}, column {1} of {2}",
                    self.start.line, self.start.col, self.filename
                )
            },
            _ => msg,
        }
    }

    fn extract_lines(&self, code: &str, msg: String) -> String {
        let start = &self.start;
        let end = &self.end;
        let select_lines = code.lines()
            .skip(start.line - 1)
            .take(end.line - start.line + 1)
            .join("\n");
        let marker_width = if start.line == end.line && end.col > start.col {
            end.col - start.col
        } else {
            1
        };
        let err_markers = format!(
            "{0}{1}\n",
            " ".repeat(start.col.saturating_sub(1)),
            "^".repeat(marker_width)
        );
        let lines_msg = if start.line == end.line {
            format!("line {0}", start.line)
        } else {
            format!("lines {0}-{1}", start.line, end.line)
        };
        format!(
            "{msg}\n\nOn {lines_msg} of {0}:\n{select_lines}\n{err_markers}",
            self.filename
        )
    }
}

impl Default for Info {
    fn default() -> Info {
        let start = FilePos::default();
        let end = FilePos::default();
        Info {filename: String::new(), start, end}
    }
}

pub trait InfoNode {
    fn get_info(&self) -> Info;
}

#[cfg(test)]
mod test {
    use super::*;

    fn pos(line: usize, col: usize, offset: usize) -> FilePos {
        FilePos::new(line, col, offset)
    }

    #[test]
    fn merge_extends_area() {
        let l = Info::new("x.hlsl", pos(1, 1, 0), pos(1, 4, 3));
        let r = Info::new("x.hlsl", pos(2, 1, 10), pos(2, 8, 17));
        let m = Info::merge(l.clone(), r);
        assert_eq!(m.start_line(), 1);
        assert!(m != l);
    }

    #[test]
    fn merge_distinct_files_drops_filename() {
        let l = Info::new("a.hlsl", pos(1, 1, 0), pos(1, 2, 1));
        let r = Info::new("b.hlsl", pos(1, 1, 0), pos(1, 2, 1));
        let m = Info::merge(l, r);
        assert_eq!(m.filename, "<unknown>");
    }

    #[test]
    fn excerpt_points_at_column() {
        let i = Info::new("t.hlsl", pos(1, 8, 7), pos(1, 11, 10));
        let msg = i.error_msg_src("bad token".to_string(), Some("float4 $$$ = 0;"));
        assert!(msg.contains("On line 1 of t.hlsl"));
        assert!(msg.contains("^^^"));
    }

    #[test]
    fn default_info_has_no_excerpt() {
        let i = Info::default();
        let msg = i.error_msg("plain".to_string());
        assert_eq!(msg, "plain");
    }
}

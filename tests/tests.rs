use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use stdcsv::{
    transcode, Context, Error, Normalize, Quotes, ReadResult, Reader,
    ReaderBuilder, Record, WriterBuilder,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

/// Read every record, starting over whenever the reader restarts.
fn read_all(rdr: &mut Reader) -> Vec<Vec<String>> {
    let mut rec = Record::new();
    let mut rows = vec![];
    loop {
        match rdr.read_record(&mut rec).unwrap() {
            ReadResult::Record => rows.push(
                rec.iter()
                    .map(|f| String::from_utf8_lossy(f).into_owned())
                    .collect(),
            ),
            ReadResult::Restart(_) => rows.clear(),
            ReadResult::End => return rows,
        }
    }
}

/// Open the same file as a stream and as a memory map.
fn both_readers(
    b: &ReaderBuilder,
    path: &Path,
) -> Vec<(&'static str, Reader)> {
    vec![
        ("stream", b.from_path(path).unwrap()),
        ("mmap", b.from_path_mmap(path).unwrap()),
    ]
}

const BASIC: &str = "\
id,name,comment
1,widget,\"plain\"
2,gadget,\"has, a comma\"
3,gizmo,\"says \"\"hi\"\"\"
";

#[test]
fn stream_and_mmap_agree() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "basic.csv", BASIC.as_bytes());
    let expected = vec![
        vec!["id", "name", "comment"],
        vec!["1", "widget", "plain"],
        vec!["2", "gadget", "has, a comma"],
        vec!["3", "gizmo", "says \"hi\""],
    ];
    for (kind, mut rdr) in both_readers(&ReaderBuilder::new(), &path) {
        assert_eq!(read_all(&mut rdr), expected, "{}", kind);
        assert_eq!(rdr.row_count(), 4, "{}", kind);
    }
}

#[test]
fn line_endings() {
    let dir = tempfile::tempdir().unwrap();
    let data = b"a,b\r\nc,d\r\n\"e\r\nf\",g\r\n";
    let path = write_file(dir.path(), "crlf.csv", data);
    for (kind, mut rdr) in both_readers(&ReaderBuilder::new(), &path) {
        assert_eq!(
            read_all(&mut rdr),
            vec![vec!["a", "b"], vec!["c", "d"], vec!["e\nf", "g"]],
            "{}",
            kind
        );
        assert_eq!(rdr.embedded_breaks(), 1, "{}", kind);
    }

    let mut rdr =
        ReaderBuilder::new().from_seekable(Cursor::new("a,b\rc,d\re,f"));
    assert_eq!(
        read_all(&mut rdr),
        vec![vec!["a", "b"], vec!["c", "d"], vec!["e", "f"]]
    );
}

#[test]
fn empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "empty.csv", b"");
    for (kind, mut rdr) in both_readers(&ReaderBuilder::new(), &path) {
        assert!(read_all(&mut rdr).is_empty(), "{}", kind);
    }
}

#[test]
fn no_phantom_last_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "t.csv", b"a\nb\n");
    for (kind, mut rdr) in both_readers(&ReaderBuilder::new(), &path) {
        assert_eq!(read_all(&mut rdr), vec![vec!["a"], vec!["b"]], "{}", kind);
    }
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new();
    let res = ReaderBuilder::new()
        .context(ctx.clone())
        .from_path(dir.path().join("nope.csv"));
    match res {
        Err(Error::Io { ref context, .. }) => {
            assert!(context.starts_with("open "), "{}", context)
        }
        res => panic!("unexpected result: {:?}", res.map(|_| ())),
    }
    let diags = ctx.drain_diagnostics();
    assert_eq!(diags.len(), 1);
    assert!(diags[0].contains("nope.csv"));
}

#[test]
fn long_lines_grow_the_buffer() {
    let wide: Vec<String> = (0..500).map(|i| format!("field{}", i)).collect();
    let quoted = format!("\"{}\"", "q".repeat(3000));
    let data = format!("{}\n{},tail\n", wide.join(","), quoted);

    let mut rdr = ReaderBuilder::new().from_seekable(Cursor::new(data));
    let rows = read_all(&mut rdr);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], wide);
    assert_eq!(rows[1], vec!["q".repeat(3000), "tail".to_string()]);
}

#[test]
fn fields_survive_growth_during_continuation() {
    // The raw text is reallocated several times while the last field pulls
    // in more lines, after the zero-copy fields before it were recorded.
    let mut data = String::from("short,also short,\"start");
    for i in 0..30 {
        data.push('\n');
        data.push_str(&format!("{}", i).repeat(200));
    }
    data.push_str("\"\n");

    let mut rdr = ReaderBuilder::new()
        .embedded_break(b"|")
        .from_seekable(Cursor::new(data));
    let mut rec = Record::new();
    assert_eq!(rdr.read_record(&mut rec).unwrap(), ReadResult::Record);
    assert_eq!(rec.len(), 3);
    assert_eq!(&rec[0], b"short");
    assert_eq!(&rec[1], b"also short");
    assert!(!rec.is_owned(0));
    assert!(rec.is_owned(2));
    assert!(rec[2].starts_with(b"start|000"));
    assert_eq!(rec[2].iter().filter(|&&b| b == b'|').count(), 30);
    assert_eq!(rdr.embedded_breaks(), 30);
}

#[test]
fn continuation_cap() {
    let mut data = String::from("a,\"unterminated\n");
    for _ in 0..50 {
        data.push_str("more\n");
    }
    let ctx = Context::new();
    let mut rdr = ReaderBuilder::new()
        .context(ctx.clone())
        .from_seekable(Cursor::new(data));
    let mut rec = Record::new();
    match rdr.read_record(&mut rec) {
        Err(Error::ContinuationLimitExceeded { line: 1, limit: 40, .. }) => {}
        res => panic!("unexpected result: {:?}", res),
    }
    assert_eq!(
        ctx.drain_diagnostics(),
        vec!["Line 1: RFC4180 Qualifier issue."]
    );
}

#[test]
fn failsafe_walks_down_to_none() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let data = "a,b\n\"x\"y,\"z\nlast,row\n";
    let path = write_file(dir.path(), "bad.csv", data.as_bytes());
    let mut b = ReaderBuilder::new();
    b.failsafe(true);
    for (kind, mut rdr) in both_readers(&b, &path) {
        assert_eq!(
            read_all(&mut rdr),
            vec![vec!["a", "b"], vec!["\"x\"y", "\"z"], vec!["last", "row"]],
            "{}",
            kind
        );
        assert_eq!(rdr.quotes(), Quotes::None, "{}", kind);
        assert_eq!(
            rdr.context().drain_diagnostics(),
            vec![
                "Line 2: Qualifier issue. RFC4180 quotes disabled.",
                "Line 2: Qualifier issue. WEAK quotes disabled.",
            ],
            "{}",
            kind
        );
    }
}

#[test]
fn restart_keeps_sniffed_delimiter() {
    let data = "a;b\n\"unterminated;x\n";
    let mut rdr = ReaderBuilder::new()
        .failsafe(true)
        .from_seekable(Cursor::new(data));
    let mut rec = Record::new();
    assert_eq!(rdr.read_record(&mut rec).unwrap(), ReadResult::Record);
    assert_eq!(
        rdr.read_record(&mut rec).unwrap(),
        ReadResult::Restart(Quotes::Weak)
    );
    assert_eq!(rdr.delimiter(), Some(&b";"[..]));
}

#[test]
fn normalization_per_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "ragged.csv", b"a,b\n1,2,3\n4\n");
    let mut b = ReaderBuilder::new();
    b.normalize(Normalize::FirstRecord);
    for (kind, mut rdr) in both_readers(&b, &path) {
        let expected =
            vec![vec!["a", "b"], vec!["1", "2"], vec!["4", ""]];
        assert_eq!(read_all(&mut rdr), expected, "{}", kind);
        rdr.reset().unwrap();
        assert_eq!(read_all(&mut rdr), expected, "{}", kind);
    }
}

#[test]
fn none_matches_literal_split() {
    let lines = [
        "plain,fields,here",
        "\"quoted, with comma\",x",
        ",,leading,empties",
        "trailing,,",
        "\"\"\"\",\"",
    ];
    let mut rdr = ReaderBuilder::new()
        .delimiter(b",")
        .quotes(Quotes::None)
        .build();
    let mut rec = Record::new();
    for line in &lines {
        rdr.parse(line.as_bytes(), &mut rec).unwrap();
        let expected: Vec<&str> = line.split(',').collect();
        assert_eq!(rec, expected, "line: {}", line);
    }
}

#[test]
fn rfc4180_round_trip() {
    let fields: Vec<&[u8]> = vec![
        &b"plain"[..],
        &b"with,comma"[..],
        &b"with \"quotes\""[..],
        &b"multi\nline"[..],
        &b"cr\rhere"[..],
        &b"\""[..],
        &b""[..],
        &b"~^_"[..],
    ];
    for &delim in &[&b","[..], &b"~^_"[..], &b"\t"[..]] {
        let mut wtr = WriterBuilder::new()
            .delimiter(delim)
            .to_stdout_staged()
            .unwrap();
        wtr.write_record(&fields).unwrap();
        let mut out = vec![];
        wtr.close_into(&mut out).unwrap();
        assert_eq!(out.pop(), Some(b'\n'));

        let mut rdr = ReaderBuilder::new().delimiter(delim).build();
        let mut rec = Record::new();
        rdr.parse(&out, &mut rec).unwrap();
        assert_eq!(rec, fields, "delimiter: {:?}", delim);
    }
}

#[test]
fn atomic_commit() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let dest = write_file(dir.path(), "out.csv", b"old contents\n");
    let ctx = Context::new();

    let mut wtr =
        WriterBuilder::new().context(ctx.clone()).to_path(&dest).unwrap();
    for i in 0..100 {
        wtr.write_record(&[format!("row{}", i), "x,y".to_string()]).unwrap();
    }
    let tmp = wtr.temp_path().unwrap().to_path_buf();
    assert!(tmp.exists());
    assert_eq!(fs::read(&dest).unwrap(), b"old contents\n");
    assert_eq!(ctx.pending(), vec![tmp.clone()]);

    wtr.close().unwrap();
    assert!(!tmp.exists());
    assert!(ctx.pending().is_empty());
    let out = fs::read_to_string(&dest).unwrap();
    assert_eq!(out.lines().count(), 100);
    assert!(out.starts_with("row0,\"x,y\"\n"));
    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec!["out.csv"]);
}

#[test]
fn transcode_file_to_file() {
    init();
    let dir = tempfile::tempdir().unwrap();
    let src = write_file(
        dir.path(),
        "in.csv",
        b"name|note\nscreen|\"5\" wide\"\nplug|ok\n",
    );
    let dest = dir.path().join("out.tsv");

    let mut rdr =
        ReaderBuilder::new().failsafe(true).from_path_mmap(&src).unwrap();
    let mut wtr = WriterBuilder::new()
        .delimiter(b"\t")
        .quotes(Quotes::All)
        .to_path(&dest)
        .unwrap();
    assert_eq!(transcode(&mut rdr, &mut wtr).unwrap(), 3);
    wtr.close().unwrap();

    assert_eq!(rdr.quotes(), Quotes::Weak);
    assert_eq!(
        fs::read_to_string(&dest).unwrap(),
        "\"name\"\t\"note\"\n\"screen\"\t\"5\"\" wide\"\n\"plug\"\t\"ok\"\n"
    );
}

#[test]
fn contexts_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let a = Context::new();
    let b = Context::new();

    let wa = WriterBuilder::new()
        .context(a.clone())
        .to_path(dir.path().join("a.csv"))
        .unwrap();
    let wb = WriterBuilder::new()
        .context(b.clone())
        .to_path(dir.path().join("b.csv"))
        .unwrap();
    assert_eq!(a.pending().len(), 1);
    assert_eq!(b.pending().len(), 1);
    assert_ne!(a.pending(), b.pending());

    assert_eq!(a.remove_pending(), 1);
    assert!(!wa.temp_path().unwrap().exists());
    assert!(wb.temp_path().unwrap().exists());
    assert_eq!(b.pending().len(), 1);

    let mut rdr = ReaderBuilder::new().context(a.clone()).build();
    let mut rec = Record::new();
    assert!(rdr.parse(b"\"open", &mut rec).is_err());
    assert_eq!(a.diagnostics().len(), 1);
    assert!(b.diagnostics().is_empty());
}

use std::{
    fmt::Display,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    str::{FromStr, SplitWhitespace},
};

use log::debug;

use crate::error::{Result, SessionError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            SessionError::io(
                format!("could not read credentials file {}", path.display()),
                e,
            )
        })?;
        Ok(Self::parse(&text))
    }

    /// First token is the login, second the password. A missing token leaves that field empty.
    pub fn parse(text: &str) -> Self {
        let mut tokens = text.split_whitespace();
        let login = tokens.next().unwrap_or_default().to_string();
        let password = tokens.next().unwrap_or_default().to_string();
        Self { login, password }
    }
}

/// One vector of the batch. Its length goes on the wire separately from the values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vector {
    values: Vec<f64>,
}

impl Vector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered vectors of one session. Results are matched to vectors by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorBatch {
    vectors: Vec<Vector>,
}

struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
    position: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
            position: 0,
        }
    }

    fn next_parsed<T>(&mut self, what: &str) -> io::Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.position += 1;
        let token = self.inner.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("input ended before token {} ({what})", self.position),
            )
        })?;
        token.parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("token {} ({what}) '{token}' is invalid: {e}", self.position),
            )
        })
    }
}

impl VectorBatch {
    pub fn new(vectors: Vec<Vector>) -> Self {
        Self { vectors }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let context = || format!("could not read vector file {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| SessionError::io(context(), e))?;
        Self::parse_text(&text).map_err(|e| SessionError::io(context(), e))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_text(text).map_err(|e| SessionError::io("could not parse vector data", e))
    }

    fn parse_text(text: &str) -> io::Result<Self> {
        let mut tokens = Tokens::new(text);
        let count: u32 = tokens.next_parsed("vector count")?;
        // the counts come from the file, do not trust them for allocation
        let mut vectors = Vec::with_capacity((count as usize).min(1024));
        for i in 0..count {
            let size: u32 = tokens.next_parsed(&format!("size of vector {i}"))?;
            let mut values = Vec::with_capacity((size as usize).min(1024));
            for j in 0..size {
                values.push(tokens.next_parsed::<f64>(&format!("element {j} of vector {i}"))?);
            }
            vectors.push(Vector::new(values));
        }
        debug!("Parsed batch of {} vectors", vectors.len());
        Ok(Self { vectors })
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Called with the vector index and its result after the result is persisted.
pub type ResultHook = Box<dyn FnMut(usize, f64)>;

/// Receives the per-vector results in order, one line each.
pub struct ResultSink<W: Write> {
    out: W,
    name: String,
    written: usize,
    hook: Option<ResultHook>,
}

impl ResultSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = path.as_ref().into();
        let file = File::create(&path).map_err(|e| {
            SessionError::io(
                format!("could not create result file {}", path.display()),
                e,
            )
        })?;
        Ok(Self {
            out: BufWriter::new(file),
            name: path.display().to_string(),
            written: 0,
            hook: None,
        })
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            name: "result sink".to_string(),
            written: 0,
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: impl FnMut(usize, f64) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Append one result and flush so it is on disk before the next vector goes out.
    pub fn record(&mut self, value: f64) -> Result<()> {
        writeln!(self.out, "{value}")
            .and_then(|_| self.out.flush())
            .map_err(|e| SessionError::io(format!("could not write to {}", self.name), e))?;
        if let Some(hook) = self.hook.as_mut() {
            hook(self.written, value);
        }
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

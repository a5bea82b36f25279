use std::{
    fs,
    io::{Read, Write},
    net::TcpListener,
    path::Path,
    sync::mpsc,
    thread::{self, JoinHandle},
};

use abacus::{
    ErrorKind, Session, SessionParams, SessionState,
    digest::salted_digest,
    files::{Credentials, ResultSink, VectorBatch},
    run,
};

const SALT: &[u8] = b"5A1TF0RTE5T";

/// What the stub server saw from the client.
#[derive(Debug, Default)]
struct Transcript {
    login: Vec<u8>,
    digest: Vec<u8>,
    vectors: Vec<Vec<f64>>,
}

fn read_u32(stream: &mut impl Read) -> u32 {
    let mut buf = [0; 4];
    stream.read_exact(&mut buf).unwrap();
    u32::from_ne_bytes(buf)
}

fn read_f64(stream: &mut impl Read) -> f64 {
    let mut buf = [0; 8];
    stream.read_exact(&mut buf).unwrap();
    f64::from_ne_bytes(buf)
}

/// Stub of the computation server: answers every vector with its sum, `0` for an empty one.
fn spawn_sum_server(login_len: usize) -> (u16, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut transcript = Transcript::default();

        transcript.login = vec![0; login_len];
        stream.read_exact(&mut transcript.login).unwrap();
        stream.write_all(SALT).unwrap();

        transcript.digest = vec![0; 32];
        stream.read_exact(&mut transcript.digest).unwrap();
        stream.write_all(b"OK").unwrap();

        let count = read_u32(&mut stream);
        for _ in 0..count {
            let size = read_u32(&mut stream);
            let values: Vec<f64> = (0..size).map(|_| read_f64(&mut stream)).collect();
            stream
                .write_all(&values.iter().fold(0.0, |acc, v| acc + v).to_ne_bytes())
                .unwrap();
            transcript.vectors.push(values);
        }

        // client hangs up without a closing message
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
        transcript
    });
    (port, handle)
}

fn write_inputs(dir: &Path, credentials: &str, vectors: &str) -> SessionParams {
    let data = dir.join("data.txt");
    let input = dir.join("input.txt");
    fs::write(&data, credentials).unwrap();
    fs::write(&input, vectors).unwrap();
    SessionParams {
        input,
        result: dir.join("result.txt"),
        data,
        port: 0,
        address: "127.0.0.1".to_string(),
    }
}

#[test]
fn test_end_to_end_results_file() {
    let dir = tempfile::tempdir().unwrap();
    let (port, server) = spawn_sum_server("user".len());
    let mut params = write_inputs(dir.path(), "user\nP@ssW0rd\n", "2\n2\n1.0 2.0\n1\n5.0\n");
    params.port = port as i32;

    let (tx, rx) = mpsc::channel();
    let results = run(&params, move |i, v| tx.send((i, v)).unwrap()).unwrap();
    assert_eq!(results, vec![3.0, 5.0]);
    assert_eq!(fs::read_to_string(&params.result).unwrap(), "3\n5\n");
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![(0, 3.0), (1, 5.0)]);

    let transcript = server.join().unwrap();
    assert_eq!(transcript.login, b"user");
    assert_eq!(
        transcript.digest,
        salted_digest(SALT, b"P@ssW0rd").into_bytes()
    );
    assert_eq!(transcript.vectors, vec![vec![1.0, 2.0], vec![5.0]]);
}

#[test]
fn test_end_to_end_zero_length_vector() {
    let dir = tempfile::tempdir().unwrap();
    let (port, server) = spawn_sum_server("u".len());
    let mut params = write_inputs(dir.path(), "u p", "3\n0\n2\n0.5 0.25\n0\n");
    params.port = port as i32;

    let results = run(&params, |_, _| {}).unwrap();
    assert_eq!(results, vec![0.0, 0.75, 0.0]);
    assert_eq!(fs::read_to_string(&params.result).unwrap(), "0\n0.75\n0\n");
    assert_eq!(
        server.join().unwrap().vectors,
        vec![vec![], vec![0.5, 0.25], vec![]]
    );
}

#[test]
fn test_server_hangs_up_after_login() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut login = [0; 4];
        stream.read_exact(&mut login).unwrap();
        // rejected: close without a salt
    });

    let mut session = Session::connect("127.0.0.1", port as i32).unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    let credentials = Credentials::parse("user secret");
    let batch = VectorBatch::parse("1 1 1.0").unwrap();
    let err = session
        .execute(&credentials, &batch, || Ok(ResultSink::new(Vec::new())))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(session.state(), SessionState::Failed);
    assert!(!session.transport().is_open());
    server.join().unwrap();
}

#[test]
fn test_no_server_is_network_error() {
    let dir = tempfile::tempdir().unwrap();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut params = write_inputs(dir.path(), "user pw", "1 1 1.0");
    params.port = port as i32;

    let err = run(&params, |_, _| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    // never authenticated, so no result file
    assert!(!params.result.exists());
}

#[test]
fn test_missing_input_is_io_error_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = write_inputs(dir.path(), "user pw", "1 1 1.0");
    params.input = dir.path().join("missing.txt");
    // nothing listens on port 0, an attempted connect would be a network error
    let err = run(&params, |_, _| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_truncated_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let params = write_inputs(dir.path(), "user pw", "2\n2\n1.0 2.0\n");
    let err = run(&params, |_, _| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_failed_connect_yields_no_session() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = Session::connect("127.0.0.1", port as i32).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
}

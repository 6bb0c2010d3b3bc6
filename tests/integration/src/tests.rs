//! Integration tests for the envd SDK
//!
//! These run real local processes through the loopback envd and need
//! `/bin/bash`. Run with: cargo test -p integration-tests

use std::time::{Duration, Instant};

use envd_loopback::LoopbackConfig;
use envd_sdk::{
    CommandOptions, ConnectOptions, Error, HandleState, PtyOptions, PtySize, TimeoutKind,
};
use integration_tests::*;
use semver::Version;

// ============================================================================
// Command Tests
// ============================================================================

#[tokio::test]
async fn test_run_printf() {
    let env = TestEnv::new();

    let result = env
        .client
        .commands()
        .run("printf hello", CommandOptions::default())
        .await
        .expect("printf should succeed");

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello");
    // Login profiles on the host may write to stderr; the command itself must not
    assert!(!result.stderr.contains("hello"), "stderr was {:?}", result.stderr);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_nonzero_exit_raises_command_exit() {
    let env = TestEnv::new();

    let err = env
        .client
        .commands()
        .run("echo oops >&2; exit 7", CommandOptions::default())
        .await
        .unwrap_err();

    let result = err.command_result().expect("expected a command exit error");
    assert_eq!(result.exit_code, 7);
    assert!(result.stderr.ends_with("oops\n"), "stderr was {:?}", result.stderr);
    assert!(err.to_string().contains("exited with code 7"));
}

#[tokio::test]
async fn test_cwd_and_envs() {
    let env = TestEnv::new();

    let mut opts = CommandOptions {
        cwd: Some("/tmp".to_string()),
        ..Default::default()
    };
    opts.envs.insert("GREETING".to_string(), "hi there".to_string());

    let result = env
        .client
        .commands()
        .run("printf '%s:%s' \"$PWD\" \"$GREETING\"", opts)
        .await
        .unwrap();
    assert_eq!(result.stdout, "/tmp:hi there");
}

#[tokio::test]
async fn test_concurrent_handles_keep_output_separate() {
    let env = TestEnv::new();
    let commands = env.client.commands();

    let mut handles = Vec::new();
    for i in 0..8 {
        let cmd = format!("printf 'handle-{i}-'; sleep 0.1; printf 'done-{i}'", i = i);
        let handle = commands
            .start(&cmd, CommandOptions::default())
            .await
            .expect("start");
        handles.push((i, handle));
    }

    for (i, handle) in handles {
        let result = handle.wait().await.expect("wait");
        assert_eq!(result.stdout, format!("handle-{i}-done-{i}", i = i));
    }
}

#[tokio::test]
async fn test_callbacks_see_every_chunk_in_order() {
    let env = TestEnv::new();
    let out = Collected::default();
    let err = Collected::default();

    let opts = CommandOptions::default()
        .on_stdout({
            let out = out.clone();
            move |chunk| out.push(chunk.as_bytes())
        })
        .on_stderr({
            let err = err.clone();
            move |chunk| err.push(chunk.as_bytes())
        });

    let result = env
        .client
        .commands()
        .run("for i in 1 2 3; do echo $i; sleep 0.05; done; echo bad >&2", opts)
        .await
        .unwrap();

    assert_eq!(out.text(), "1\n2\n3\n");
    assert_eq!(out.text(), result.stdout);
    assert!(err.text().ends_with("bad\n"), "stderr was {:?}", err.text());
}

#[tokio::test]
async fn test_send_stdin() {
    let env = TestEnv::new();
    let commands = env.client.commands();

    let handle = commands
        .start("read -r line; echo \"$line\"", CommandOptions::default())
        .await
        .unwrap();

    commands.send_stdin(handle.pid(), "ping\n").await.unwrap();

    let result = handle.wait().await.unwrap();
    assert!(result.stdout.contains("ping"), "stdout was {:?}", result.stdout);
}

#[tokio::test]
async fn test_disconnect_then_reconnect() {
    let env = TestEnv::new();
    let commands = env.client.commands();

    let handle = commands
        .start("echo before; sleep 1; echo after; exit 3", CommandOptions::default())
        .await
        .unwrap();
    let pid = handle.pid();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.stdout().await.contains("before") {
        assert!(Instant::now() < deadline, "no output before disconnect");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    handle.disconnect();
    assert!(matches!(handle.wait().await, Err(Error::Sandbox(_))));
    assert!(matches!(handle.state(), HandleState::Detached));

    let reconnected = commands
        .connect(pid, ConnectOptions::default())
        .await
        .expect("process is still running");
    let err = reconnected.wait().await.unwrap_err();
    let result = err.command_result().expect("command exit error");

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stdout, "after\n");
}

#[tokio::test]
async fn test_kill() {
    let env = TestEnv::new();
    let commands = env.client.commands();

    let finished = commands.start("true", CommandOptions::default()).await.unwrap();
    finished.wait().await.unwrap();
    assert!(!commands.kill(finished.pid()).await.unwrap());

    let sleeping = commands
        .start("sleep 30", CommandOptions::default())
        .await
        .unwrap();
    assert!(sleeping.kill().await.unwrap());

    let outcome = tokio::time::timeout(Duration::from_secs(5), sleeping.wait())
        .await
        .expect("killed process should end");
    let err = outcome.expect_err("killed process must not exit cleanly");
    assert_ne!(err.command_result().map(|r| r.exit_code), Some(0));
}

#[tokio::test]
async fn test_list_shows_tagged_process() {
    let env = TestEnv::new();
    let commands = env.client.commands();

    let opts = CommandOptions {
        tag: Some("long-job".to_string()),
        ..Default::default()
    };
    let handle = commands.start("sleep 30", opts).await.unwrap();

    let processes = commands.list().await.unwrap();
    let listed = processes
        .iter()
        .find(|p| p.pid == handle.pid())
        .expect("started process is listed");
    assert_eq!(listed.tag.as_deref(), Some("long-job"));
    assert_eq!(listed.cmd, "/bin/bash");

    handle.kill().await.unwrap();
}

#[tokio::test]
async fn test_unknown_pid() {
    let env = TestEnv::new();
    let commands = env.client.commands();

    let err = commands.send_stdin(4_000_000, "x").await.unwrap_err();
    assert!(err.is_not_found());

    let err = commands
        .connect(4_000_000, ConnectOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Timeout Tests
// ============================================================================

#[tokio::test]
async fn test_request_timeout_fires_before_acknowledgment() {
    let env =
        TestEnv::with_config(LoopbackConfig::default().with_start_delay(Duration::from_secs(3)));

    let opts = CommandOptions {
        request_timeout: Some(Duration::from_millis(1)),
        ..Default::default()
    };

    let started = Instant::now();
    let err = env
        .client
        .commands()
        .start("sleep 1", opts)
        .await
        .unwrap_err();

    assert_eq!(err.timeout_kind(), Some(TimeoutKind::Request));
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "timeout took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_execution_timeout_ends_command() {
    let env = TestEnv::new();

    let opts = CommandOptions {
        timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let err = env
        .client
        .commands()
        .run("sleep 30", opts)
        .await
        .unwrap_err();

    assert_eq!(err.timeout_kind(), Some(TimeoutKind::Execution));
}

// ============================================================================
// Capability Tests
// ============================================================================

#[tokio::test]
async fn test_closed_stdin_gated_by_envd_version() {
    let old =
        TestEnv::with_config(LoopbackConfig::default().with_envd_version(Version::new(0, 2, 0)));
    let opts = CommandOptions {
        stdin: Some(false),
        ..Default::default()
    };
    let err = old.client.commands().run("true", opts).await.unwrap_err();
    assert!(matches!(err, Error::Unsupported { .. }), "got {:?}", err);

    let current = TestEnv::new();
    let opts = CommandOptions {
        stdin: Some(false),
        ..Default::default()
    };
    let result = current
        .client
        .commands()
        .run("cat; echo closed", opts)
        .await
        .unwrap();
    assert_eq!(result.stdout, "closed\n");
}

// ============================================================================
// PTY Tests
// ============================================================================

#[tokio::test]
async fn test_pty_resize_reported_inside_session() {
    let env = TestEnv::new();
    let pty = env.client.pty();
    let output = Collected::default();

    let opts = PtyOptions::default().on_data({
        let output = output.clone();
        move |bytes| output.push(bytes)
    });
    let handle = pty
        .create(PtySize { cols: 80, rows: 24 }, opts)
        .await
        .expect("create pty");

    pty.resize(handle.pid(), PtySize { cols: 100, rows: 24 })
        .await
        .unwrap();
    pty.send_input(handle.pid(), "stty size\n").await.unwrap();

    output
        .wait_for("24 100", Duration::from_secs(10))
        .await
        .unwrap();

    pty.send_input(handle.pid(), "exit\n").await.unwrap();
    tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("shell should exit")
        .expect("clean exit");
}

#[tokio::test]
async fn test_pty_sets_terminal_type() {
    let env = TestEnv::new();
    let pty = env.client.pty();
    let output = Collected::default();

    let opts = PtyOptions::default().on_data({
        let output = output.clone();
        move |bytes| output.push(bytes)
    });
    let handle = pty.create(PtySize::default(), opts).await.unwrap();

    pty.send_input(handle.pid(), "echo \"term=$TERM\"\n")
        .await
        .unwrap();
    output
        .wait_for("term=xterm-256color", Duration::from_secs(10))
        .await
        .unwrap();

    assert!(pty.kill(handle.pid()).await.unwrap());
    let outcome = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("killed shell should end");
    assert!(outcome.is_err());
}

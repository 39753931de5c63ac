//! End-to-end tests against an in-process Modbus TCP slave simulator.
//!
//! The simulator speaks real MBAP framing over a real socket: it serves
//! register/coil reads out of a fixed data block, echoes writes, and answers
//! out-of-range reads with Illegal Data Address.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use modscan::{
    expand, read_operations, ExceptionCode, ModbusFunction, Operation, Orchestrator, QueryOutcome,
    RegisterRange, RegisterSpace, ResponsePayload, ScanConfig, SlaveTarget, TcpConnector,
};

const REGISTERS: [u16; 8] = [1234, 5678, 0, 0xFFFF, 7, 8, 9, 10];
const COILS: [bool; 8] = [true, false, true, true, false, false, true, false];

/// Start a simulated slave on an ephemeral port and return its port number.
async fn start_slave() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(serve_connection(stream));
        }
    });
    port
}

async fn serve_connection(mut stream: TcpStream) {
    loop {
        let mut header = [0u8; 7];
        if stream.read_exact(&mut header).await.is_err() {
            return;
        }
        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut body = vec![0u8; length - 1];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }

        let pdu = build_reply_pdu(&body);
        let mut frame = Vec::with_capacity(7 + pdu.len());
        frame.extend_from_slice(&header[0..4]);
        frame.extend_from_slice(&(1 + pdu.len() as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend_from_slice(&pdu);
        if stream.write_all(&frame).await.is_err() {
            return;
        }
    }
}

fn build_reply_pdu(body: &[u8]) -> Vec<u8> {
    let function = body[0];
    let address = u16::from_be_bytes([body[1], body[2]]) as usize;
    let word = u16::from_be_bytes([body[3], body[4]]) as usize;
    match function {
        0x03 | 0x04 => {
            if address + word > REGISTERS.len() {
                return vec![function | 0x80, 0x02];
            }
            let mut pdu = vec![function, (word * 2) as u8];
            for value in &REGISTERS[address..address + word] {
                pdu.extend_from_slice(&value.to_be_bytes());
            }
            pdu
        }
        0x01 | 0x02 => {
            if address + word > COILS.len() {
                return vec![function | 0x80, 0x02];
            }
            let mut packed = vec![0u8; word.div_ceil(8)];
            for (i, &coil) in COILS[address..address + word].iter().enumerate() {
                if coil {
                    packed[i / 8] |= 1 << (i % 8);
                }
            }
            let mut pdu = vec![function, packed.len() as u8];
            pdu.extend_from_slice(&packed);
            pdu
        }
        // Writes: echo address and value/quantity.
        _ => {
            let mut pdu = vec![function];
            pdu.extend_from_slice(&body[1..5]);
            pdu
        }
    }
}

fn orchestrator(timeout: Duration) -> Orchestrator<TcpConnector> {
    Orchestrator::new(
        TcpConnector::with_timeout(timeout),
        ScanConfig::new().with_request_timeout(timeout),
    )
}

#[tokio::test]
async fn read_holding_registers_from_logical_address() {
    let port = start_slave().await;

    // HR 40001-40002 normalizes to protocol address 0, quantity 2.
    let start = RegisterSpace::Holding.to_protocol(40001).unwrap();
    let operations = read_operations(
        ModbusFunction::ReadHoldingRegisters,
        RegisterRange::new(start, 2).unwrap(),
    )
    .unwrap();
    let targets = vec![SlaveTarget::with_port("127.0.0.1", port, 1)];

    let results = orchestrator(Duration::from_secs(2))
        .run(expand(&targets, &operations).unwrap())
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].outcome,
        QueryOutcome::Success(ResponsePayload::Registers(vec![1234, 5678]))
    );
}

#[tokio::test]
async fn write_multiple_registers_acknowledged() {
    let port = start_slave().await;

    let targets = vec![SlaveTarget::with_port("127.0.0.1", port, 1)];
    let operations = vec![Operation::write_registers(0, vec![1234, 5678])];

    let results = orchestrator(Duration::from_secs(2))
        .run(expand(&targets, &operations).unwrap())
        .await
        .unwrap();

    assert_eq!(
        results[0].outcome,
        QueryOutcome::Success(ResponsePayload::WriteAck)
    );
}

#[tokio::test]
async fn out_of_range_read_yields_exception_outcome() {
    let port = start_slave().await;

    let targets = vec![SlaveTarget::with_port("127.0.0.1", port, 1)];
    let operations = vec![Operation::ReadHoldingRegisters {
        address: 100,
        quantity: 4,
    }];

    let results = orchestrator(Duration::from_secs(2))
        .run(expand(&targets, &operations).unwrap())
        .await
        .unwrap();

    assert_eq!(
        results[0].outcome,
        QueryOutcome::Exception(ExceptionCode::IllegalDataAddress)
    );
}

#[tokio::test]
async fn unreachable_target_does_not_affect_siblings() {
    let port = start_slave().await;

    // Bind-then-drop to get a port with nothing listening.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = dead.local_addr().unwrap().port();
    drop(dead);

    let targets = vec![
        SlaveTarget::with_port("127.0.0.1", port, 1),
        SlaveTarget::with_port("127.0.0.1", dead_port, 1),
        SlaveTarget::with_port("127.0.0.1", port, 2),
    ];
    let operations = vec![Operation::ReadCoils {
        address: 0,
        quantity: 8,
    }];

    let results = orchestrator(Duration::from_secs(2))
        .run(expand(&targets, &operations).unwrap())
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].outcome,
        QueryOutcome::Success(ResponsePayload::Bits(COILS.to_vec()))
    );
    assert!(matches!(
        results[1].outcome,
        QueryOutcome::Transport(_) | QueryOutcome::Timeout
    ));
    assert_eq!(
        results[2].outcome,
        QueryOutcome::Success(ResponsePayload::Bits(COILS.to_vec()))
    );
}

#[tokio::test]
async fn fan_out_across_many_units_completes() {
    let port = start_slave().await;

    let targets: Vec<SlaveTarget> = (1..=10)
        .map(|unit| SlaveTarget::with_port("127.0.0.1", port, unit))
        .collect();
    let operations = vec![
        Operation::ReadHoldingRegisters {
            address: 0,
            quantity: 8,
        },
        Operation::ReadCoils {
            address: 0,
            quantity: 8,
        },
    ];
    let jobs = expand(&targets, &operations).unwrap();
    assert_eq!(jobs.len(), 20);

    let results = Orchestrator::new(
        TcpConnector::with_timeout(Duration::from_secs(2)),
        ScanConfig::new()
            .with_workers(4)
            .with_request_timeout(Duration::from_secs(2)),
    )
    .run(jobs)
    .await
    .unwrap();

    assert_eq!(results.len(), 20);
    assert!(results.iter().all(|r| r.outcome.is_success()));
}

//! Manual smoke test: joins a relay server, flies in a circle for a while,
//! says hello and leaves, printing everything the server sends back.

use clap::Parser;
use relay_shared::{
    Connect, Disconnect, Packet, PlayerChatEnter, Pose, ShipUpdate, WirePacket, DEFAULT_PORT,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Relay server address
    #[arg(short, long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    server: SocketAddr,

    /// Player name sent with Connect
    #[arg(short, long, default_value = "Probe")]
    name: String,

    /// Ship model to request
    #[arg(short, long, default_value_t = 1)]
    model: i16,

    /// Number of ship updates to send, one per second
    #[arg(short, long, default_value_t = 10)]
    updates: u32,
}

/// Prints whatever arrives until the socket stays quiet for `wait`.
async fn drain(socket: &UdpSocket, buf: &mut [u8], wait: Duration) {
    while let Ok(Ok((len, _))) = timeout(wait, socket.recv_from(buf)).await {
        match Packet::decode(&buf[..len]) {
            Ok(packet) => println!("  <- {:?}", packet),
            Err(e) => println!("  <- undecodable {} byte datagram: {}", len, e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let connect = Connect {
        model: args.model,
        name: args.name.clone(),
    };
    println!("Sending Connect to {} as {}", args.server, args.name);
    socket.send_to(&connect.encode(), args.server).await?;

    let mut buf = [0u8; 2048];
    let (len, _) = timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
        .await
        .map_err(|_| "no reply from server (full, or not running)")??;

    let ack = match Packet::decode(&buf[..len])? {
        Packet::ConnectAcknowledge(ack) => ack,
        other => return Err(format!("expected ConnectAcknowledge, got {:?}", other).into()),
    };
    println!(
        "Connected as client {} flying ship {}",
        ack.client_id, ack.ship_id
    );
    drain(&socket, &mut buf, Duration::from_millis(250)).await;

    for i in 0..args.updates {
        let angle = i as f64 / 5.0;
        let pose = Pose::at(
            (angle.cos() * 10_000.0) as i32,
            0,
            (angle.sin() * 10_000.0) as i32,
        );
        let update = ShipUpdate {
            ship_id: ack.ship_id,
            pose,
        };
        println!("Sending update {} at ({}, {})", i, pose.pos_x, pose.pos_z);
        socket.send_to(&update.encode(), args.server).await?;

        drain(&socket, &mut buf, Duration::from_millis(100)).await;
        sleep(Duration::from_secs(1)).await;
    }

    let chat = PlayerChatEnter {
        message: format!("{} says hello", args.name),
    };
    socket.send_to(&chat.encode(), args.server).await?;
    drain(&socket, &mut buf, Duration::from_millis(250)).await;

    println!("Sending Disconnect");
    socket.send_to(&Disconnect.encode(), args.server).await?;

    println!("Probe client finished");
    Ok(())
}

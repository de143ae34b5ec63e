use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::{ClientEvent, Direction};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted lobby client for smoke-testing a server")]
struct Args {
    /// WebSocket URL of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:3001")]
    server: String,

    /// Display name to log in with
    #[arg(short, long, default_value = "tester")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    let (mut sender, mut receiver) = ws_stream.split();

    // Print everything the server sends until the script is done
    let printer = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            if let Message::Text(text) = frame {
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(json) => println!("<- {}: {}", json["event"], json["data"]),
                    Err(_) => println!("<- (unparsed) {}", text),
                }
            }
        }
    });

    let mut script = vec![
        ClientEvent::Login {
            display_name: args.name.clone(),
        },
        ClientEvent::LobbyChat {
            text: "hello lobby".to_string(),
        },
        ClientEvent::CreateRoom {
            name: format!("{}'s arena", args.name),
            max_players: Some(2),
            game_type: None,
            game_duration_seconds: Some(30),
        },
        ClientEvent::RoomChat {
            text: "anyone up for a round?".to_string(),
        },
        ClientEvent::StartGame,
    ];
    for direction in [
        Direction::Right,
        Direction::Right,
        Direction::Down,
        Direction::Left,
        Direction::Up,
    ] {
        script.push(ClientEvent::move_to(direction));
    }
    script.push(ClientEvent::EndGame);
    script.push(ClientEvent::RequestLobby);
    script.push(ClientEvent::LeaveRoom);

    for event in script {
        let text = serde_json::to_string(&event)?;
        println!("-> {}", text);
        sender.send(Message::Text(text)).await?;
        sleep(Duration::from_millis(300)).await;
    }

    sender.send(Message::Close(None)).await?;
    let _ = timeout(Duration::from_secs(2), printer).await;

    println!("Test client finished");
    Ok(())
}

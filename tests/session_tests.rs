mod common;

use common::{Devices, Peers, settle};
use oai_rtc::sdk::{Speaker, WEATHER_TOOL_NAME};
use oai_rtc::{
    Error, PeerEvent, Realtime, RealtimeClient, SessionEvent, SessionPhase, ToolRegistry, Turn, WeatherTool,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

async fn mount_relay(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .and(body_json(json!({ "model": MODEL, "voice": "verse" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sess_1",
            "client_secret": { "value": "ek_123", "expires_at": 1_700_000_060_u64 }
        })))
        .mount(server)
        .await;
}

async fn mount_signaling(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/realtime"))
        .and(query_param("model", MODEL))
        .and(header("authorization", "Bearer ek_123"))
        .and(header("content-type", "application/sdp"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("content-type", "application/sdp")
                .set_body_string("v=0\r\no=- 2 2 IN IP4 127.0.0.1\r\n"),
        )
        .expect(1..)
        .mount(server)
        .await;
}

fn client(server: &MockServer, devices: Arc<Devices>, peers: Arc<Peers>, tools: ToolRegistry) -> RealtimeClient {
    Realtime::builder()
        .relay_url(server.uri())
        .realtime_url(format!("{}/v1/realtime", server.uri()))
        .greeting("Introduce yourself.")
        .transcription_model("whisper-1")
        .tools(tools)
        .build(devices, peers)
        .unwrap()
}

#[tokio::test]
async fn connects_and_configures_on_channel_open() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    mount_signaling(&server).await;
    let devices = Arc::new(Devices::default());
    let peers = Arc::new(Peers::default());
    let client = client(&server, devices.clone(), peers.clone(), ToolRegistry::new());

    let session = client.connect().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Connected);
    assert_eq!(session.credential_expires_at(), Some(1_700_000_060));

    let peer = peers.last();
    assert_eq!(peer.tracks.load(Ordering::SeqCst), 1);
    assert!(peer.remote.lock().unwrap().as_ref().unwrap().sdp.starts_with("v=0"));
    assert_eq!(peer.channel().len(), 0);

    peer.push(PeerEvent::ChannelOpen);
    let channel = peer.channel();
    settle(|| channel.len() == 2).await;

    let frames = channel.json();
    assert_eq!(frames[0]["type"], "session.update");
    assert_eq!(frames[0]["session"]["input_audio_transcription"]["model"], "whisper-1");
    assert_eq!(frames[0]["session"]["max_response_output_tokens"], 4096);
    assert_eq!(frames[1]["type"], "response.create");
    assert_eq!(frames[1]["response"]["instructions"], "Introduce yourself.");

    session.close();
    session.close();
    assert_eq!(peer.closes.load(Ordering::SeqCst), 1);
    assert_eq!(devices.mics.lock().unwrap()[0].stops.load(Ordering::SeqCst), 1);
    assert_eq!(channel.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn relay_failure_skips_media() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "upstream unavailable" })))
        .mount(&server)
        .await;
    let devices = Arc::new(Devices::default());
    let peers = Arc::new(Peers::default());
    let client = client(&server, devices.clone(), peers.clone(), ToolRegistry::new());
    let mut events = client.events().unwrap();

    let err = client.connect().await.unwrap_err();

    assert!(matches!(&err, Error::Auth(msg) if msg.contains("upstream unavailable")));
    assert_eq!(devices.requests.load(Ordering::SeqCst), 0);
    assert_eq!(peers.count(), 0);
    assert_eq!(client.phase(), SessionPhase::Closed);

    let mut kinds = Vec::new();
    while let Some(event) = events.try_recv() {
        if let SessionEvent::Error { kind, .. } = event {
            kinds.push(kind);
        }
    }
    assert_eq!(kinds, ["auth"]);
}

#[tokio::test]
async fn denied_microphone_after_credential_ends_closed() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    let devices = Devices::denying();
    let peers = Arc::new(Peers::default());
    let client = client(&server, devices.clone(), peers.clone(), ToolRegistry::new());

    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, Error::MediaAccess(_)));
    assert_eq!(devices.requests.load(Ordering::SeqCst), 1);
    assert_eq!(client.phase(), SessionPhase::Closed);
    for peer in peers.created.lock().unwrap().iter() {
        assert_eq!(peer.tracks.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn rejected_offer_is_negotiation_error() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1/realtime"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let devices = Arc::new(Devices::default());
    let peers = Arc::new(Peers::default());
    let client = client(&server, devices.clone(), peers.clone(), ToolRegistry::new());

    let err = client.connect().await.unwrap_err();

    assert!(matches!(err, Error::Negotiation { status: Some(401), .. }));
    assert_eq!(err.to_string(), "Session negotiation failed: 401 Unauthorized");
    assert_eq!(devices.mics.lock().unwrap()[0].stops.load(Ordering::SeqCst), 1);
    assert_eq!(peers.last().closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn weather_call_round_trips_through_channel() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    mount_signaling(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("name", "Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "name": "Paris", "latitude": 48.85, "longitude": 2.35 }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "current": {
                "temperature_2m": 21.0,
                "apparent_temperature": 20.4,
                "relative_humidity_2m": 40.0,
                "wind_speed_10m": 9.7,
                "weather_code": 1
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut tools = ToolRegistry::new();
    WeatherTool::with_base_urls(&server.uri(), &server.uri())
        .unwrap()
        .register(&mut tools);
    let peers = Arc::new(Peers::default());
    let client = client(&server, Arc::new(Devices::default()), peers.clone(), tools);
    let mut events = client.events().unwrap();
    let session = client.connect().await.unwrap();

    let peer = peers.last();
    let channel = peer.channel();
    peer.push(PeerEvent::ChannelOpen);
    settle(|| channel.len() == 2).await;
    assert_eq!(channel.json()[0]["session"]["tools"][0]["name"], WEATHER_TOOL_NAME);

    peer.message(&json!({ "type": "input_audio_buffer.speech_started", "item_id": "item_1" }));
    peer.message(&json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_1",
        "transcript": "What's the weather in Paris?"
    }));
    peer.message(&json!({ "type": "response.created", "response": { "id": "resp_1" } }));
    peer.message(&json!({
        "type": "response.done",
        "response": {
            "id": "resp_1",
            "status": "completed",
            "output": [
                {
                    "type": "message",
                    "id": "msg_1",
                    "role": "assistant",
                    "content": [{ "type": "text", "text": "Let me check." }]
                },
                {
                    "type": "function_call",
                    "id": "fc_1",
                    "name": WEATHER_TOOL_NAME,
                    "call_id": "call_1",
                    "arguments": "{\"location\":\"Paris\"}"
                }
            ]
        }
    }));
    settle(|| channel.len() == 4).await;

    let frames = channel.json();
    assert_eq!(frames[2]["type"], "conversation.item.create");
    assert_eq!(frames[2]["item"]["role"], "user");
    let report: serde_json::Value =
        serde_json::from_str(frames[2]["item"]["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(report["location"], "Paris");
    assert_eq!(report["weather_code"], 1);
    assert_eq!(frames[3]["type"], "response.create");

    let transcript = session.finish().await.unwrap();
    let entries = transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].speaker, Speaker::User);
    assert!(entries[0].is_final);
    assert_eq!(entries[1].speaker, Speaker::Assistant);
    assert_eq!(entries[1].text, "Let me check.");

    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&SessionEvent::TurnChanged(Turn::UserSpeaking)));
    assert!(seen.contains(&SessionEvent::ToolCall {
        name: WEATHER_TOOL_NAME.to_string(),
        call_id: "call_1".to_string(),
    }));
    assert!(seen.contains(&SessionEvent::PhaseChanged(SessionPhase::Closed)));
}

#[tokio::test]
async fn reconnect_starts_from_torn_down_state() {
    let server = MockServer::start().await;
    mount_relay(&server).await;
    mount_signaling(&server).await;
    let devices = Arc::new(Devices::default());
    let peers = Arc::new(Peers::default());
    let client = client(&server, devices.clone(), peers.clone(), ToolRegistry::new());

    let first = client.connect().await.unwrap();
    let second = client.connect().await.unwrap();

    assert_eq!(first.phase(), SessionPhase::Closed);
    assert_eq!(second.phase(), SessionPhase::Connected);
    let mics = devices.mics.lock().unwrap();
    assert_eq!(mics.len(), 2);
    assert_eq!(mics[0].stops.load(Ordering::SeqCst), 1);
    assert_eq!(mics[1].stops.load(Ordering::SeqCst), 0);
}

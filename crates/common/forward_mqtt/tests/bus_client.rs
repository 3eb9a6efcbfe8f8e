use forward_mqtt::Action;
use forward_mqtt::BusClient;
use forward_mqtt::Config;
use forward_mqtt::Message;
use forward_mqtt::PasswordSettings;
use forward_mqtt::Settings;
use forward_mqtt::Topic;
use rumqttd::Broker;
use rumqttd::Config as BrokerConfig;
use rumqttd::ConnectionSettings;
use rumqttd::ServerSettings;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start_broker(port: u16) {
    let router_config = rumqttd::RouterConfig {
        max_segment_size: 10240,
        max_segment_count: 10,
        max_connections: 10,
        initialized_filters: None,
        ..Default::default()
    };

    let connections_settings = ConnectionSettings {
        connection_timeout_ms: 1000,
        max_payload_size: 268435455,
        max_inflight_count: 200,
        auth: None,
        dynamic_filters: false,
        external_auth: None,
    };

    let server_config = ServerSettings {
        name: port.to_string(),
        listen: ([127, 0, 0, 1], port).into(),
        tls: None,
        next_connection_delay_ms: 1,
        connections: connections_settings,
    };

    let mut servers = HashMap::new();
    servers.insert("1".to_string(), server_config);

    let config = BrokerConfig {
        id: 0,
        router: router_config,
        cluster: None,
        console: None,
        v4: Some(servers),
        ws: None,
        v5: None,
        bridge: None,
        prometheus: None,
        metrics: None,
    };

    std::thread::Builder::new()
        .name(format!("broker-{port}"))
        .spawn(move || Broker::new(config).start().unwrap())
        .unwrap();
}

fn password_config(name: &str, port: u16) -> Config {
    let unique_name = format!(
        "{name}-{}",
        std::iter::repeat_with(fastrand::alphanumeric)
            .take(6)
            .collect::<String>()
    );
    Config::new(
        unique_name,
        Settings::Password(PasswordSettings {
            host: "127.0.0.1".into(),
            port,
            username: String::new(),
            password: String::new(),
        }),
    )
}

#[tokio::test]
async fn connect_action_completes_once_broker_accepts() {
    let port = free_port().await;
    start_broker(port);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = BusClient::new(&password_config("client-a", port)).unwrap();
    Action::Connect.perform(&client, TIMEOUT).await.unwrap();

    assert!(client.is_connected());
}

#[tokio::test]
async fn publish_is_delivered_to_a_subscriber() {
    let port = free_port().await;
    start_broker(port);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let publisher = BusClient::new(&password_config("publisher", port)).unwrap();
    let subscriber = BusClient::new(&password_config("subscriber", port)).unwrap();

    Action::Connect.perform(&publisher, TIMEOUT).await.unwrap();
    Action::Connect.perform(&subscriber, TIMEOUT).await.unwrap();

    let filter = forward_mqtt::TopicFilter::new("demo/topic").unwrap();
    Action::Subscribe(filter).perform(&subscriber, TIMEOUT).await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    subscriber.on_message().install(move |message| {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(message);
        }
    });

    let message = Message::new(Topic::new("demo/topic").unwrap(), b"hello".to_vec());
    Action::Publish(message.clone())
        .perform(&publisher, TIMEOUT)
        .await
        .unwrap();

    let received = tokio::time::timeout(TIMEOUT, rx).await.unwrap().unwrap();
    assert_eq!(received.payload, b"hello");
    assert_eq!(received.topic, message.topic);
}

#[tokio::test]
async fn connect_times_out_when_no_broker_is_listening() {
    let config = password_config("lonely-client", 1);
    let client = BusClient::new(&config).unwrap();

    let result = Action::Connect
        .perform(&client, Duration::from_millis(300))
        .await;
    assert!(result.is_err());
}

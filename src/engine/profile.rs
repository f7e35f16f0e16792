//! Client configuration blob handed to the engine at creation time

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Profile id defined by the generated client configuration
pub const DEFAULT_PROFILE: &str = "uni2";

/// Transport overrides parsed from the `key=value,...` extra-parameters string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraParams {
    /// Suffix appended to every agent id, so several clients can share a host
    pub n: String,
    pub client_port: String,
    pub client_rtp_port_min: String,
    pub client_rtp_port_max: String,
    /// `auto` lets the engine pick the server address
    pub server_ip: String,
    pub server_port: String,
}

impl Default for ExtraParams {
    fn default() -> Self {
        Self {
            n: "1".to_string(),
            client_port: "8062".to_string(),
            client_rtp_port_min: "4000".to_string(),
            client_rtp_port_max: "5000".to_string(),
            server_ip: "auto".to_string(),
            server_port: "8060".to_string(),
        }
    }
}

impl ExtraParams {
    /// Parse `key=value` pairs separated by commas. Unknown keys and pairs
    /// without `=` are ignored; later keys override earlier ones.
    pub fn parse(raw: &str) -> Self {
        let mut params = Self::default();

        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                warn!("Ignoring extra parameter without a value: {}", pair);
                continue;
            };
            let value = value.trim().to_string();

            match key.trim() {
                "n" => params.n = value,
                "client_port" => params.client_port = value,
                "client_rtp_port_min" => params.client_rtp_port_min = value,
                "client_rtp_port_max" => params.client_rtp_port_max = value,
                "server_ip" => params.server_ip = value,
                "server_port" => params.server_port = value,
                other => debug!("Ignoring unknown extra parameter: {}", other),
            }
        }

        params
    }
}

/// Renders the XML client configuration consumed by the engine
#[derive(Debug, Clone)]
pub struct ClientProfile {
    params: ExtraParams,
}

impl ClientProfile {
    pub fn new(params: ExtraParams) -> Self {
        Self { params }
    }

    /// Every parameter value is XML-escaped before it lands in the document.
    pub fn render(&self) -> String {
        let p = &self.params;
        let n = escape(p.n.as_str());

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<unimrcpclient xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
               xsi:noNamespaceSchemaLocation="unimrcpclient.xsd"
               version="1.0"
               subfolder="client-profiles">
  <properties>
    <ip type="auto"/>
  </properties>
  <components>
    <resource-factory>
      <resource id="speechsynth" enable="true"/>
      <resource id="speechrecog" enable="true"/>
      <resource id="recorder" enable="true"/>
      <resource id="speakverify" enable="true"/>
    </resource-factory>
    <sip-uac id="SIP-Agent-{n}" type="SofiaSIP">
      <sip-port>{client_port}</sip-port>
      <sip-transport>udp</sip-transport>
      <ua-name>UniMRCP SofiaSIP</ua-name>
      <sdp-origin>UniMRCPClient</sdp-origin>
    </sip-uac>
    <rtsp-uac id="RTSP-Agent-{n}" type="UniRTSP">
      <max-connection-count>100</max-connection-count>
      <sdp-origin>UniMRCPClient</sdp-origin>
    </rtsp-uac>
    <mrcpv2-uac id="MRCPv2-Agent-{n}">
      <max-connection-count>100</max-connection-count>
      <max-shared-use-count>100</max-shared-use-count>
      <offer-new-connection>false</offer-new-connection>
      <rx-buffer-size>1024</rx-buffer-size>
      <tx-buffer-size>1024</tx-buffer-size>
    </mrcpv2-uac>
    <media-engine id="Media-Engine-{n}">
      <realtime-rate>1</realtime-rate>
    </media-engine>
    <rtp-factory id="RTP-Factory-{n}">
      <rtp-port-min>{rtp_min}</rtp-port-min>
      <rtp-port-max>{rtp_max}</rtp-port-max>
    </rtp-factory>
  </components>
  <settings>
    <rtp-settings id="RTP-Settings-{n}">
      <jitter-buffer>
        <adaptive>1</adaptive>
        <playout-delay>50</playout-delay>
        <max-playout-delay>600</max-playout-delay>
        <time-skew-detection>1</time-skew-detection>
      </jitter-buffer>
      <ptime>20</ptime>
      <codecs>PCMU PCMA L16/96/8000 telephone-event/101/8000</codecs>
      <rtcp enable="false">
        <rtcp-bye>1</rtcp-bye>
        <tx-interval>5000</tx-interval>
        <rx-resolution>1000</rx-resolution>
      </rtcp>
    </rtp-settings>
    <sip-settings id="UniMRCP-SIP-Settings">
      <server-ip>{server_ip}</server-ip>
      <server-port>{server_port}</server-port>
    </sip-settings>
  </settings>
  <profiles>
    <mrcpv2-profile id="{profile}">
      <sip-uac>SIP-Agent-{n}</sip-uac>
      <mrcpv2-uac>MRCPv2-Agent-{n}</mrcpv2-uac>
      <media-engine>Media-Engine-{n}</media-engine>
      <rtp-factory>RTP-Factory-{n}</rtp-factory>
      <sip-settings>UniMRCP-SIP-Settings</sip-settings>
      <rtp-settings>RTP-Settings-{n}</rtp-settings>
    </mrcpv2-profile>
  </profiles>
</unimrcpclient>
"#,
            n = n,
            client_port = escape(p.client_port.as_str()),
            rtp_min = escape(p.client_rtp_port_min.as_str()),
            rtp_max = escape(p.client_rtp_port_max.as_str()),
            server_ip = escape(p.server_ip.as_str()),
            server_port = escape(p.server_port.as_str()),
            profile = DEFAULT_PROFILE,
        )
    }
}

/// Profile ids declared by `mrcpv2-profile` elements in a blob, in document
/// order. Parsing stops at the first malformed construct; ids read before it
/// are kept.
pub fn declared_profiles(blob: &str) -> Vec<String> {
    let mut reader = Reader::from_str(blob);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref() == b"mrcpv2-profile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() != b"id" {
                        continue;
                    }
                    match attr.unescape_value() {
                        Ok(id) => ids.push(id.into_owned()),
                        Err(err) => warn!("Ignoring unreadable profile id: {}", err),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                warn!(
                    "Client configuration is not well-formed at byte {}: {}",
                    reader.buffer_position(),
                    err
                );
                break;
            }
            _ => {}
        }
    }

    ids
}

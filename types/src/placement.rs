//! Placement metadata reported by the container scheduler for a task.

use serde::{Deserialize, Serialize};

/// Attachment type of an elastic network interface.
pub const NETWORK_INTERFACE_ATTACHMENT: &str = "ElasticNetworkInterface";
/// Detail key carrying the attachment's private IPv4 address.
pub const PRIVATE_IPV4_DETAIL: &str = "privateIPv4Address";
/// Detail key carrying the attachment's interface id.
pub const NETWORK_INTERFACE_ID_DETAIL: &str = "networkInterfaceId";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDetail {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAttachment {
    #[serde(rename = "type")]
    pub attachment_type: String,
    #[serde(default)]
    pub details: Vec<AttachmentDetail>,
}

impl NetworkAttachment {
    #[must_use]
    pub fn is_network_interface(&self) -> bool {
        self.attachment_type == NETWORK_INTERFACE_ATTACHMENT
    }

    /// Value of the named detail, ignoring blank values.
    #[must_use]
    pub fn detail(&self, name: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|detail| detail.name == name)
            .and_then(|detail| detail.value.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Where a task landed: its network attachments and any public address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementInfo {
    #[serde(default)]
    pub attachments: Vec<NetworkAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

impl PlacementInfo {
    #[must_use]
    pub fn network_interface(&self) -> Option<&NetworkAttachment> {
        self.attachments
            .iter()
            .find(|attachment| attachment.is_network_interface())
    }

    #[must_use]
    pub fn private_ipv4(&self) -> Option<&str> {
        self.network_interface()
            .and_then(|attachment| attachment.detail(PRIVATE_IPV4_DETAIL))
    }

    #[must_use]
    pub fn public_ipv4(&self) -> Option<&str> {
        self.public_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    }
}

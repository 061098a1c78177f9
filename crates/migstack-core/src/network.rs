//! Network and security group provisioning
//!
//! Builds the fixed network topology: one `/16` address block with no NAT or
//! VPN gateway, a public tier (`/24` per zone) and an isolated tier (`/28` per
//! zone). The private tier is never provisioned. A single security group with
//! open egress and exactly two ingress rules is bound to the network.

use crate::context::BuildContext;
use crate::error::{ConfigurationError, StackError};
use crate::locator::AttributeRef;
use crate::params::SSH_PORT;
use migstack_kernel::{DescriptorId, DescriptorKind, DescriptorSpec};
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;

pub const VPC_LOGICAL_ID: &str = "Vpc";
pub const SECURITY_GROUP_LOGICAL_ID: &str = "VpcSecurityGroup";

pub const SECURITY_GROUP_DESCRIPTION: &str = "Outbound: Allow SSH Access to EC2 instances";
pub const SSH_RULE_DESCRIPTION: &str = "Ingress Rule: Allow SSH Access From Outside";
pub const PORT_RULE_DESCRIPTION: &str =
    "Ingress Rule: Allow Access to Specified Port Access From Outside";

/// The network's address block
pub const VPC_CIDR: Ipv4Cidr = Ipv4Cidr::new_unchecked(Ipv4Addr::new(10, 0, 0, 0), 16);

/// Subnet tiers in allocation order
pub const SUBNET_TIERS: [SubnetTier; 2] = [
    SubnetTier {
        name: "public",
        subnet_type: SubnetType::Public,
        cidr_mask: 24,
    },
    SubnetTier {
        name: "isolated",
        subnet_type: SubnetType::Isolated,
        cidr_mask: 28,
    },
];

const ZONE_SUFFIXES: [char; 6] = ['a', 'b', 'c', 'd', 'e', 'f'];

/// An IPv4 block in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    base: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// Any IPv4 address
    pub const ANY: Ipv4Cidr = Ipv4Cidr::new_unchecked(Ipv4Addr::UNSPECIFIED, 0);

    const fn new_unchecked(base: Ipv4Addr, prefix: u8) -> Self {
        Self { base, prefix }
    }

    /// Build a block, masking off host bits. `None` if `prefix > 32`.
    pub fn new(base: Ipv4Addr, prefix: u8) -> Option<Self> {
        if prefix > 32 {
            return None;
        }
        let base = Ipv4Addr::from(u32::from(base) & Self::mask(prefix));
        Some(Self { base, prefix })
    }

    fn mask(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix))
        }
    }

    pub fn base(&self) -> Ipv4Addr {
        self.base
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of addresses in the block
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    fn start(&self) -> u64 {
        u64::from(u32::from(self.base))
    }

    fn end(&self) -> u64 {
        self.start() + self.size()
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.start() >= self.start() && other.end() <= self.end()
    }

    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.prefix)
    }
}

impl Serialize for Ipv4Cidr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetType {
    /// Routed to an internet gateway
    Public,
    /// No route in or out of the network
    Isolated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetTier {
    pub name: &'static str,
    pub subnet_type: SubnetType,
    pub cidr_mask: u8,
}

/// One concrete per-zone subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub tier: &'static str,
    pub subnet_type: SubnetType,
    pub availability_zone: String,
    pub cidr: Ipv4Cidr,
}

/// Pack per-zone subnets for each tier into `block`.
///
/// Tiers are laid out in order, zones in order within a tier, each subnet
/// aligned to its own size.
pub fn allocate_subnets(
    block: Ipv4Cidr,
    tiers: &[SubnetTier],
    zones: &[String],
) -> Result<Vec<Subnet>, ConfigurationError> {
    let mut cursor = block.start();
    let mut subnets = Vec::with_capacity(tiers.len() * zones.len());

    for tier in tiers {
        if tier.cidr_mask < block.prefix || tier.cidr_mask > 32 {
            return Err(ConfigurationError::invalid(
                "subnetConfiguration",
                format!("/{} does not fit inside {block}", tier.cidr_mask),
            ));
        }
        let size = 1u64 << (32 - u32::from(tier.cidr_mask));
        for zone in zones {
            let start = cursor.div_ceil(size) * size;
            if start + size > block.end() {
                return Err(ConfigurationError::invalid(
                    "maxAzs",
                    format!("{} zones exhaust the address block {block}", zones.len()),
                ));
            }
            let base = u32::try_from(start).map_err(|_| {
                ConfigurationError::invalid("maxAzs", format!("address block {block} overflowed"))
            })?;
            subnets.push(Subnet {
                tier: tier.name,
                subnet_type: tier.subnet_type,
                availability_zone: zone.clone(),
                cidr: Ipv4Cidr::new_unchecked(Ipv4Addr::from(base), tier.cidr_mask),
            });
            cursor = start + size;
        }
    }
    Ok(subnets)
}

/// The network descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub id: DescriptorId,
    pub logical_id: &'static str,
    pub cidr: Ipv4Cidr,
    pub max_azs: u8,
    pub nat_gateways: u8,
    pub vpn_gateway: bool,
    pub tiers: Vec<SubnetTier>,
    pub subnets: Vec<Subnet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NetworkDescriptor {
    /// Network id, known only once the executor creates the network
    pub fn vpc_id(&self) -> AttributeRef {
        AttributeRef::new(self.logical_id, "VpcId")
    }

    pub fn subnets_of(&self, subnet_type: SubnetType) -> impl Iterator<Item = &Subnet> {
        self.subnets
            .iter()
            .filter(move |s| s.subnet_type == subnet_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressRule {
    pub peer: Ipv4Cidr,
    pub protocol: Protocol,
    pub port: u16,
    pub description: &'static str,
}

impl IngressRule {
    pub fn tcp_from_anywhere(port: u16, description: &'static str) -> Self {
        Self {
            peer: Ipv4Cidr::ANY,
            protocol: Protocol::Tcp,
            port,
            description,
        }
    }
}

/// Security group bound to the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupDescriptor {
    pub id: DescriptorId,
    pub logical_id: &'static str,
    pub name: String,
    pub description: &'static str,
    pub allow_all_outbound: bool,
    pub vpc: DescriptorId,
    pub ingress: Vec<IngressRule>,
}

impl SecurityGroupDescriptor {
    pub fn ingress_ports(&self) -> Vec<u16> {
        self.ingress.iter().map(|r| r.port).collect()
    }
}

/// Network plus its security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkContext {
    pub network: NetworkDescriptor,
    pub security_group: SecurityGroupDescriptor,
}

impl NetworkContext {
    /// Subnets the database cluster is placed in
    pub fn isolated_subnets(&self) -> impl Iterator<Item = &Subnet> {
        self.network.subnets_of(SubnetType::Isolated)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkProvisioner;

impl NetworkProvisioner {
    /// Register the network and its security group, recording `sg -> vpc`
    pub fn provision(ctx: &BuildContext) -> Result<NetworkContext, StackError> {
        let params = ctx.params();
        let zones: Vec<String> = ZONE_SUFFIXES
            .iter()
            .take(usize::from(params.network.max_azs))
            .map(|suffix| format!("{}{suffix}", ctx.env().region))
            .collect();
        let subnets = allocate_subnets(VPC_CIDR, &SUBNET_TIERS, &zones)?;

        let vpc_id = ctx.register(DescriptorSpec::new(DescriptorKind::Network, VPC_LOGICAL_ID))?;
        let network = NetworkDescriptor {
            id: vpc_id,
            logical_id: VPC_LOGICAL_ID,
            cidr: VPC_CIDR,
            max_azs: params.network.max_azs,
            nat_gateways: 0,
            vpn_gateway: false,
            tiers: SUBNET_TIERS.to_vec(),
            subnets,
            description: params.network.vpc_description.clone(),
        };

        let sg_id = ctx.register(
            DescriptorSpec::new(DescriptorKind::SecurityGroup, SECURITY_GROUP_LOGICAL_ID)
                .with_physical_name(params.security_group_name()),
        )?;
        ctx.require(sg_id, vpc_id)?;

        let security_group = SecurityGroupDescriptor {
            id: sg_id,
            logical_id: SECURITY_GROUP_LOGICAL_ID,
            name: params.security_group_name().to_string(),
            description: SECURITY_GROUP_DESCRIPTION,
            allow_all_outbound: true,
            vpc: vpc_id,
            ingress: vec![
                IngressRule::tcp_from_anywhere(SSH_PORT, SSH_RULE_DESCRIPTION),
                IngressRule::tcp_from_anywhere(params.database.port, PORT_RULE_DESCRIPTION),
            ],
        };

        tracing::debug!(
            subnets = network.subnets.len(),
            security_group = %security_group.name,
            "provisioned network"
        );

        Ok(NetworkContext {
            network,
            security_group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("us-east-1{}", ZONE_SUFFIXES[i])).collect()
    }

    #[test]
    fn cidr_display_and_masking() {
        let cidr = Ipv4Cidr::new(Ipv4Addr::new(10, 0, 3, 77), 24).unwrap();
        assert_eq!(cidr.to_string(), "10.0.3.0/24");
        assert_eq!(cidr.size(), 256);
        assert_eq!(Ipv4Cidr::ANY.to_string(), "0.0.0.0/0");
        assert!(Ipv4Cidr::new(Ipv4Addr::LOCALHOST, 33).is_none());
    }

    #[test]
    fn allocates_tiers_in_order() {
        let subnets = allocate_subnets(VPC_CIDR, &SUBNET_TIERS, &zones(2)).unwrap();
        let cidrs: Vec<String> = subnets.iter().map(|s| s.cidr.to_string()).collect();

        assert_eq!(
            cidrs,
            vec!["10.0.0.0/24", "10.0.1.0/24", "10.0.2.0/28", "10.0.2.16/28"]
        );
        assert_eq!(subnets[1].availability_zone, "us-east-1b");
        assert_eq!(subnets[2].subnet_type, SubnetType::Isolated);
    }

    #[test]
    fn allocated_subnets_never_overlap() {
        let subnets = allocate_subnets(VPC_CIDR, &SUBNET_TIERS, &zones(6)).unwrap();
        assert_eq!(subnets.len(), 12);

        for (i, a) in subnets.iter().enumerate() {
            assert!(VPC_CIDR.contains(&a.cidr));
            for b in &subnets[i + 1..] {
                assert!(!a.cidr.overlaps(&b.cidr), "{} overlaps {}", a.cidr, b.cidr);
            }
        }
    }

    #[test]
    fn exhausting_the_block_fails() {
        let tiny = Ipv4Cidr::new(Ipv4Addr::new(10, 0, 0, 0), 23).unwrap();
        let err = allocate_subnets(tiny, &SUBNET_TIERS, &zones(3)).unwrap_err();
        assert_eq!(err.field(), Some("maxAzs"));
    }

    #[test]
    fn tier_wider_than_block_fails() {
        let tiny = Ipv4Cidr::new(Ipv4Addr::new(10, 0, 0, 0), 26).unwrap();
        let err = allocate_subnets(tiny, &SUBNET_TIERS, &zones(1)).unwrap_err();
        assert_eq!(err.field(), Some("subnetConfiguration"));
    }

    #[test]
    fn ingress_rule_serializes_peer_as_cidr() {
        let rule = IngressRule::tcp_from_anywhere(22, SSH_RULE_DESCRIPTION);
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["peer"], "0.0.0.0/0");
        assert_eq!(json["protocol"], "tcp");
    }
}

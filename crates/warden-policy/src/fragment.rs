use serde::{Deserialize, Serialize};

/// Access patterns with a template in the built-in catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fragment {
    S3FolderPerTenant,
    DynamoLeadingKey,
    SqsTenantQueue,
    SecretsManagerResourceTag,
    EfsAccessPointPerTenant,
    ParameterStorePathPerTenant,
}

impl Fragment {
    pub const ALL: [Fragment; 6] = [
        Fragment::S3FolderPerTenant,
        Fragment::DynamoLeadingKey,
        Fragment::SqsTenantQueue,
        Fragment::SecretsManagerResourceTag,
        Fragment::EfsAccessPointPerTenant,
        Fragment::ParameterStorePathPerTenant,
    ];

    pub fn template_name(self) -> &'static str {
        match self {
            Fragment::S3FolderPerTenant => "S3FolderPerTenantTemplate.json",
            Fragment::DynamoLeadingKey => "DynamoLeadingKeyTemplate.json",
            Fragment::SqsTenantQueue => "SQSTenantQueueTemplate.json",
            Fragment::SecretsManagerResourceTag => "SecretsManagerResourceTagTemplate.json",
            Fragment::EfsAccessPointPerTenant => "EFSAccessPointPerTenantTemplate.json",
            Fragment::ParameterStorePathPerTenant => "ParameterStorePathPerTenantTemplate.json",
        }
    }

    pub(crate) fn template_text(self) -> &'static str {
        match self {
            Fragment::S3FolderPerTenant => {
                include_str!("../templates/S3FolderPerTenantTemplate.json")
            }
            Fragment::DynamoLeadingKey => include_str!("../templates/DynamoLeadingKeyTemplate.json"),
            Fragment::SqsTenantQueue => include_str!("../templates/SQSTenantQueueTemplate.json"),
            Fragment::SecretsManagerResourceTag => {
                include_str!("../templates/SecretsManagerResourceTagTemplate.json")
            }
            Fragment::EfsAccessPointPerTenant => {
                include_str!("../templates/EFSAccessPointPerTenantTemplate.json")
            }
            Fragment::ParameterStorePathPerTenant => {
                include_str!("../templates/ParameterStorePathPerTenantTemplate.json")
            }
        }
    }
}

impl std::fmt::Display for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.template_name())
    }
}

impl std::str::FromStr for Fragment {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Fragment::ALL
            .into_iter()
            .find(|fragment| fragment.template_name() == value)
            .ok_or(())
    }
}

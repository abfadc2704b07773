use crate::errors::ParserError;
use crate::formats::{
    ElkhornGisConfig, ElkhornGisParser, LoboConfig, LoboParser, MlmlConfig, MlmlParser,
    NerrConfig, NerrParser, NoaaTideConfig, NoaaTideParser, OceanColorConfig, OceanColorParser,
};
use crate::model::{ParseOptions, Provider, Table};

pub trait FormatParser {
    fn provider(&self) -> Provider;
    fn parse(&self, content: &str, options: &ParseOptions) -> Result<Table, ParserError>;
}

/// Immutable parser configuration for exactly one provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    Mlml(MlmlConfig),
    Lobo(LoboConfig),
    Nerr(NerrConfig),
    ElkhornGis(ElkhornGisConfig),
    NoaaTides(NoaaTideConfig),
    OceanColor(OceanColorConfig),
}

impl ProviderConfig {
    pub fn default_for(provider: Provider) -> Self {
        match provider {
            Provider::Mlml => ProviderConfig::Mlml(MlmlConfig::default()),
            Provider::Lobo => ProviderConfig::Lobo(LoboConfig::default()),
            Provider::Nerr => ProviderConfig::Nerr(NerrConfig::default()),
            Provider::ElkhornGis => ProviderConfig::ElkhornGis(ElkhornGisConfig::default()),
            Provider::NoaaTides => ProviderConfig::NoaaTides(NoaaTideConfig::default()),
            Provider::OceanColor => ProviderConfig::OceanColor(OceanColorConfig::default()),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderConfig::Mlml(_) => Provider::Mlml,
            ProviderConfig::Lobo(_) => Provider::Lobo,
            ProviderConfig::Nerr(_) => Provider::Nerr,
            ProviderConfig::ElkhornGis(_) => Provider::ElkhornGis,
            ProviderConfig::NoaaTides(_) => Provider::NoaaTides,
            ProviderConfig::OceanColor(_) => Provider::OceanColor,
        }
    }

    pub fn parser(&self) -> Box<dyn FormatParser> {
        match self {
            ProviderConfig::Mlml(config) => Box::new(MlmlParser::new(config.clone())),
            ProviderConfig::Lobo(config) => Box::new(LoboParser::new(config.clone())),
            ProviderConfig::Nerr(config) => Box::new(NerrParser::new(config.clone())),
            ProviderConfig::ElkhornGis(config) => Box::new(ElkhornGisParser::new(config.clone())),
            ProviderConfig::NoaaTides(config) => Box::new(NoaaTideParser::new(config.clone())),
            ProviderConfig::OceanColor(config) => Box::new(OceanColorParser::new(config.clone())),
        }
    }
}

pub fn parse_payload(
    config: &ProviderConfig,
    content: &str,
    options: &ParseOptions,
) -> Result<Table, ParserError> {
    config.parser().parse(content, options)
}

use crate::cnn::classifier::ClassifierConfig;
use crate::cnn::network::{BiasInit, NetworkConfig};
use std::fmt::Display;
use std::str::FromStr;
use std::{error::Error, fmt};
use xmltree::{Element, XMLNode};

#[derive(Debug)]
pub enum XmlError {
    InvalidDocument(String),
    ElementNotFound(&'static str),
    UnexpectedTag(String),
    AttributeNotFound(String, &'static str),
    AttributeParseError(String, &'static str, String),
}

impl Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDocument(e) => write!(f, "Document isn't valid XML: {}", e)?,
            Self::ElementNotFound(e) => write!(f, "Element <{}> not found", e)?,
            Self::UnexpectedTag(e) => write!(f, "Unexpected tag <{}>", e)?,
            Self::AttributeNotFound(tag, name) => {
                write!(f, "Attribute '{}' not found in <{}>", name, tag)?
            }
            Self::AttributeParseError(tag, name, value) => write!(
                f,
                "Value '{}' isn't in the correct format for attribute '{}' in tag <{}>",
                value, name, tag
            )?,
        }
        Ok(())
    }
}

impl Error for XmlError {}

type Result<T> = std::result::Result<T, XmlError>;

fn iter_elements(children: &[XMLNode]) -> impl Iterator<Item = &Element> {
    children.iter().filter_map(|o| o.as_element())
}

fn parse_attribute<T: FromStr>(element: &Element, name: &'static str) -> Result<T> {
    let value = element
        .attributes
        .get(name)
        .ok_or_else(|| XmlError::AttributeNotFound(element.name.clone(), name))?;
    value
        .parse()
        .map_err(|_| XmlError::AttributeParseError(element.name.clone(), name, value.clone()))
}

fn parse_attribute_or<T: FromStr>(element: &Element, name: &'static str, default: T) -> Result<T> {
    match element.attributes.get(name) {
        Some(value) => value
            .parse()
            .map_err(|_| XmlError::AttributeParseError(element.name.clone(), name, value.clone())),
        None => Ok(default),
    }
}

/// Load an architecture descriptor like
///
/// ```xml
/// <CnnModel>
///     <Input depth="1" width="28" height="28"/>
///     <Convolution kernelSize="3" poolSize="3" kernelScale="10" lr="0.005">
///         <Layer kernels="8"/>
///         <Layer kernels="4"/>
///     </Convolution>
///     <Classifier outputs="10" lr="0.05">
///         <Hidden values="16"/>
///     </Classifier>
/// </CnnModel>
/// ```
///
/// Attributes with engine defaults (sizes, scales, learning rates) may be
/// omitted.
pub fn load_model_xml(bytes: &[u8]) -> Result<NetworkConfig> {
    let root =
        Element::parse(bytes).map_err(|e| XmlError::InvalidDocument(e.to_string()))?;
    if root.name != "CnnModel" {
        return Err(XmlError::UnexpectedTag(root.name));
    }

    let mut input = None;
    let mut convolution = None;
    let mut classifier = None;
    for e in iter_elements(&root.children) {
        match e.name.as_str() {
            "Input" => input = Some(load_input(e)?),
            "Convolution" => convolution = Some(e),
            "Classifier" => classifier = Some(load_classifier(e)?),
            _ => return Err(XmlError::UnexpectedTag(e.name.clone())),
        }
    }

    let (depth, width, height) = input.ok_or(XmlError::ElementNotFound("Input"))?;
    let convolution = convolution.ok_or(XmlError::ElementNotFound("Convolution"))?;
    let classifier = classifier.ok_or(XmlError::ElementNotFound("Classifier"))?;

    let mut config = NetworkConfig::new(depth, width, height, Vec::new(), classifier);
    config.kernel_size = parse_attribute_or(convolution, "kernelSize", config.kernel_size)?;
    config.pool_size = parse_attribute_or(convolution, "poolSize", config.pool_size)?;
    config.kernel_scale = parse_attribute_or(convolution, "kernelScale", config.kernel_scale)?;
    config.learning_rate = parse_attribute_or(convolution, "lr", config.learning_rate)?;
    if let Some(scale) = convolution.attributes.get("biasScale") {
        let scale = scale.parse().map_err(|_| {
            XmlError::AttributeParseError(convolution.name.clone(), "biasScale", scale.clone())
        })?;
        config.bias_init = BiasInit::Random(scale);
    }

    for e in iter_elements(&convolution.children) {
        if e.name != "Layer" {
            return Err(XmlError::UnexpectedTag(e.name.clone()));
        }
        config.kernels_per_layer.push(parse_attribute(e, "kernels")?);
    }
    if config.kernels_per_layer.is_empty() {
        return Err(XmlError::ElementNotFound("Layer"));
    }

    Ok(config)
}

fn load_input(element: &Element) -> Result<(usize, usize, usize)> {
    Ok((
        parse_attribute(element, "depth")?,
        parse_attribute(element, "width")?,
        parse_attribute(element, "height")?,
    ))
}

fn load_classifier(element: &Element) -> Result<ClassifierConfig> {
    let out_values = parse_attribute(element, "outputs")?;
    let mut config = ClassifierConfig::new(Vec::new(), out_values);
    config.learning_rate = parse_attribute_or(element, "lr", config.learning_rate)?;

    for e in iter_elements(&element.children) {
        if e.name != "Hidden" {
            return Err(XmlError::UnexpectedTag(e.name.clone()));
        }
        config.hidden_values.push(parse_attribute(e, "values")?);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_full_model() {
        let xml = r#"
            <CnnModel>
                <Input depth="1" width="28" height="28"/>
                <Convolution kernelSize="5" poolSize="2" kernelScale="8" lr="0.01" biasScale="0.5">
                    <Layer kernels="8"/>
                    <Layer kernels="4"/>
                </Convolution>
                <Classifier outputs="10" lr="0.1">
                    <Hidden values="32"/>
                    <Hidden values="16"/>
                </Classifier>
            </CnnModel>
        "#;

        let config = load_model_xml(xml.as_bytes()).unwrap();
        assert_eq!(config.input_depth, 1);
        assert_eq!(config.input_width, 28);
        assert_eq!(config.input_height, 28);
        assert_eq!(config.kernels_per_layer, vec![8, 4]);
        assert_eq!(config.kernel_size, 5);
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.kernel_scale, 8.0);
        assert_eq!(config.learning_rate, 0.01);
        assert!(matches!(config.bias_init, BiasInit::Random(s) if s == 0.5));
        assert_eq!(config.classifier.out_values, 10);
        assert_eq!(config.classifier.learning_rate, 0.1);
        assert_eq!(config.classifier.hidden_values, vec![32, 16]);
    }

    #[test]
    fn test_defaults_apply_when_attributes_omitted() {
        let xml = r#"
            <CnnModel>
                <Input depth="3" width="28" height="28"/>
                <Convolution>
                    <Layer kernels="6"/>
                </Convolution>
                <Classifier outputs="10"/>
            </CnnModel>
        "#;

        let config = load_model_xml(xml.as_bytes()).unwrap();
        assert_eq!(config.kernel_size, 3);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.kernel_scale, 10.0);
        assert_eq!(config.learning_rate, 0.005);
        assert!(matches!(config.bias_init, BiasInit::Zeros));
        assert!(config.classifier.hidden_values.is_empty());
    }

    #[test]
    fn test_missing_and_malformed_parts_rejected() {
        let missing_input = r#"
            <CnnModel>
                <Convolution><Layer kernels="6"/></Convolution>
                <Classifier outputs="10"/>
            </CnnModel>
        "#;
        assert!(matches!(
            load_model_xml(missing_input.as_bytes()),
            Err(XmlError::ElementNotFound("Input"))
        ));

        let no_layers = r#"
            <CnnModel>
                <Input depth="1" width="28" height="28"/>
                <Convolution/>
                <Classifier outputs="10"/>
            </CnnModel>
        "#;
        assert!(matches!(
            load_model_xml(no_layers.as_bytes()),
            Err(XmlError::ElementNotFound("Layer"))
        ));

        let bad_attribute = r#"
            <CnnModel>
                <Input depth="one" width="28" height="28"/>
                <Convolution><Layer kernels="6"/></Convolution>
                <Classifier outputs="10"/>
            </CnnModel>
        "#;
        assert!(matches!(
            load_model_xml(bad_attribute.as_bytes()),
            Err(XmlError::AttributeParseError(_, "depth", _))
        ));

        let unknown_tag = r#"
            <CnnModel>
                <Input depth="1" width="28" height="28"/>
                <Pooling/>
                <Convolution><Layer kernels="6"/></Convolution>
                <Classifier outputs="10"/>
            </CnnModel>
        "#;
        assert!(matches!(
            load_model_xml(unknown_tag.as_bytes()),
            Err(XmlError::UnexpectedTag(_))
        ));

        assert!(matches!(
            load_model_xml(b"not xml"),
            Err(XmlError::InvalidDocument(_))
        ));
    }
}

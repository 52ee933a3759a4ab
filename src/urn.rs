use core::{fmt, str::FromStr};

use crate::{error::Result, Error};

/// A structured name of the form `module:category#fragment`, optionally
/// suffixed with `:instance` to denote an instance variant.
///
/// The fragment is optional. Equality is field by field.
///
/// ```
/// use strata::Urn;
///
/// let camera: Urn = "engine:entities#camera".parse().unwrap();
/// let second: Urn = "engine:entities#camera:second".parse().unwrap();
///
/// assert_ne!(camera, second);
/// assert!(second.is_of_type(&camera));
/// assert_eq!(second.base(), camera);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Urn {
    module: String,
    category: String,
    fragment: Option<String>,
    instance: Option<String>,
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
}

impl Urn {
    /// Construct a urn from its module and category
    pub fn new(module: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            category: category.into(),
            fragment: None,
            instance: None,
        }
    }

    /// Sets the fragment
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Sets the instance suffix
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    /// Returns true if the urn names an instance variant
    pub fn is_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Returns the urn with the instance suffix stripped
    pub fn base(&self) -> Urn {
        Self {
            instance: None,
            ..self.clone()
        }
    }

    /// Returns true if `self` names `base` or an instance of it.
    ///
    /// The instance suffix of `self` is ignored, `base` must not be an
    /// instance itself.
    pub fn is_of_type(&self, base: &Urn) -> bool {
        !base.is_instance()
            && self.module == base.module
            && self.category == base.category
            && self.fragment == base.fragment
    }
}

impl FromStr for Urn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidUrn(s.to_owned(), reason);

        let (head, tail) = match s.split_once('#') {
            Some((head, tail)) => (head, Some(tail)),
            None => (s, None),
        };

        let mut parts = head.split(':');
        let module = parts.next().ok_or_else(|| invalid("missing module"))?;
        let category = parts.next().ok_or_else(|| invalid("missing category"))?;
        let head_instance = parts.next();

        if parts.next().is_some() {
            return Err(invalid("too many ':' separators"));
        }

        let (fragment, instance) = match (tail, head_instance) {
            (Some(_), Some(_)) => return Err(invalid("instance must follow the fragment")),
            (Some(tail), None) => match tail.split_once(':') {
                Some((fragment, instance)) => (Some(fragment), Some(instance)),
                None => (Some(tail), None),
            },
            (None, instance) => (None, instance),
        };

        for part in [Some(module), Some(category), fragment, instance]
            .into_iter()
            .flatten()
        {
            if !is_valid_part(part) {
                return Err(invalid("empty or malformed segment"));
            }
        }

        Ok(Self {
            module: module.to_owned(),
            category: category.to_owned(),
            fragment: fragment.map(ToOwned::to_owned),
            instance: instance.map(ToOwned::to_owned),
        })
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.category)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        if let Some(instance) = &self.instance {
            write!(f, ":{instance}")?;
        }

        Ok(())
    }
}

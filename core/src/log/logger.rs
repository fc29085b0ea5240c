use log::LevelFilter;
use log4rs::config::Logger;
use std::{collections::HashMap, env, mem};

#[derive(Clone)]
pub(super) struct LoggerSpec {
    pub name: String,
    pub level: LevelFilter,
}

impl LoggerSpec {
    pub fn logger(&self) -> Logger {
        Logger::builder().build(self.name.clone(), self.level)
    }
}

pub(super) struct Loggers {
    loggers: Vec<LoggerSpec>,
    root_level: LevelFilter,
    rejected: Vec<String>,
}

impl Loggers {
    pub fn root_level(&self) -> LevelFilter {
        self.root_level
    }

    pub fn items(&self) -> impl IntoIterator<Item = Logger> + '_ {
        self.loggers.iter().map(|x| x.logger())
    }

    /// Filter specs which could not be parsed. They are reported once the logger is up.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}

/// Parses filter expressions of the form `level,module=level,module` into logger specs.
///
/// A bare level sets the root level, a bare module name enables all levels for that module.
pub(super) struct Builder {
    loggers: HashMap<String, LevelFilter>,
    root_level: Option<LevelFilter>,
    rejected: Vec<String>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder { loggers: HashMap::new(), root_level: None, rejected: vec![] }
    }

    pub fn parse_env(&mut self, env: &str) -> &mut Self {
        self.parse_expression(&env::var(env).unwrap_or_default())
    }

    pub fn parse_expression(&mut self, expression: &str) -> &mut Self {
        for spec in expression.split(',').map(|x| x.trim()) {
            if spec.is_empty() {
                continue;
            }
            let mut parts = spec.split('=');
            match (parts.next(), parts.next().map(|x| x.trim()), parts.next()) {
                (Some(part0), None, None) => match part0.parse() {
                    Ok(level) => {
                        self.root_level(level);
                    }
                    Err(_) => {
                        self.logger(part0.to_string(), LevelFilter::max());
                    }
                },
                (Some(part0), Some(""), None) => {
                    self.logger(part0.to_string(), LevelFilter::max());
                }
                (Some(part0), Some(part1), None) => match part1.parse() {
                    Ok(level) => {
                        self.logger(part0.to_string(), level);
                    }
                    Err(_) => self.rejected.push(spec.to_string()),
                },
                _ => self.rejected.push(spec.to_string()),
            }
        }
        self
    }

    pub fn root_level(&mut self, root_level: LevelFilter) -> &mut Self {
        self.root_level.replace(root_level);
        self
    }

    pub fn logger(&mut self, name: String, level: LevelFilter) -> &mut Self {
        self.loggers.insert(name, level);
        self
    }

    pub fn build(&mut self, default_level: LevelFilter) -> Loggers {
        let loggers = mem::take(&mut self.loggers).into_iter().map(|(name, level)| LoggerSpec { name, level }).collect::<Vec<_>>();
        Loggers { loggers, root_level: self.root_level.take().unwrap_or(default_level), rejected: mem::take(&mut self.rejected) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_expression() {
        let loggers = Builder::new().parse_expression("warn, lds_light=trace, lds_notify, bad=level, a=b=c").build(LevelFilter::Info);
        assert_eq!(loggers.root_level(), LevelFilter::Warn);
        let mut specs = loggers.loggers.iter().map(|x| (x.name.clone(), x.level)).collect::<Vec<_>>();
        specs.sort();
        assert_eq!(specs, vec![("lds_light".to_string(), LevelFilter::Trace), ("lds_notify".to_string(), LevelFilter::Trace)]);
        assert_eq!(loggers.rejected(), &["bad=level".to_string(), "a=b=c".to_string()]);
    }

    #[test]
    fn test_default_root_level() {
        let loggers = Builder::new().parse_expression("").build(LevelFilter::Info);
        assert_eq!(loggers.root_level(), LevelFilter::Info);
        assert!(loggers.items().into_iter().next().is_none());
    }
}

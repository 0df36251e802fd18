//! nginx site configuration

use std::path::PathBuf;

use crate::artifacts::{generated_header, ArtifactGenerator, ArtifactKind};
use crate::settings::{ApplicationSpec, SystemSpec};

const PROTOCOLS: &str = "TLSv1.2 TLSv1.3";

const CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
DHE-RSA-AES128-GCM-SHA256:DHE-RSA-AES256-GCM-SHA384";

/// Files the TLS server block points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    /// Full certificate chain
    pub certificate: PathBuf,
    /// Private key
    pub key: PathBuf,
    /// Diffie-Hellman parameters
    pub dhparam: PathBuf,
    /// Session ticket key
    pub session_ticket_key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Plain,
    Tls(TlsPaths),
}

/// `{SitesAvailableNginx}/{ProjectName}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseProxyConfig {
    mode: Mode,
}

impl ReverseProxyConfig {
    /// HTTP only, port 80
    pub fn plain() -> Self {
        Self { mode: Mode::Plain }
    }

    /// Redirect port 80 to an HTTPS server block using `paths`
    pub fn tls(paths: TlsPaths) -> Self {
        Self {
            mode: Mode::Tls(paths),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.mode, Mode::Tls(_))
    }

    fn plain_content(app: &ApplicationSpec) -> String {
        let mut out = String::new();
        out.push_str("server {\n");
        out.push_str("  listen 80;\n");
        push_common(&mut out, app);
        push_acme_location(&mut out);
        push_proxy_location(&mut out, app);
        out.push_str("}\n");
        out
    }

    fn tls_content(app: &ApplicationSpec, paths: &TlsPaths) -> String {
        let mut out = String::new();
        out.push_str("server {\n");
        out.push_str("  listen 80;\n");
        push_common(&mut out, app);
        push_acme_location(&mut out);
        out.push_str("  location / {\n");
        out.push_str("     return 301 https://$host$request_uri;\n");
        out.push_str("  }\n");
        out.push_str("}\n");

        out.push_str("### SSL Endpoint ####\n");
        out.push_str("server {\n");
        out.push_str("  listen 443 ssl http2;\n");
        push_common(&mut out, app);
        push_proxy_location(&mut out, app);
        out.push_str(&format!(
            "  ssl_certificate {};\n",
            paths.certificate.display()
        ));
        out.push_str(&format!("  ssl_certificate_key {};\n", paths.key.display()));
        out.push_str(&format!(
            "  ssl_trusted_certificate {};\n",
            paths.certificate.display()
        ));
        out.push_str("  ssl_stapling on;\n");
        out.push_str("  ssl_stapling_verify on;\n");
        out.push_str(&format!("  ssl_protocols {};\n", PROTOCOLS));
        out.push_str("  ssl_prefer_server_ciphers on;\n");
        out.push_str(&format!("  ssl_ciphers '{}';\n", CIPHERS));
        out.push_str("  ssl_session_cache shared:SSL:10m;\n");
        out.push_str(&format!(
            "  ssl_session_ticket_key {};\n",
            paths.session_ticket_key.display()
        ));
        out.push_str(&format!("  ssl_dhparam {};\n", paths.dhparam.display()));
        out.push_str("}\n");
        out
    }
}

impl ArtifactGenerator for ReverseProxyConfig {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::ReverseProxy
    }

    fn path(&self, system: &SystemSpec, app: &ApplicationSpec) -> PathBuf {
        system.sites_available_dir().path().join(&app.project_name)
    }

    fn content(&self, _system: &SystemSpec, app: &ApplicationSpec) -> String {
        let body = match &self.mode {
            Mode::Plain => Self::plain_content(app),
            Mode::Tls(paths) => Self::tls_content(app, paths),
        };
        format!("{}\n{}", generated_header(), body)
    }
}

fn push_common(out: &mut String, app: &ApplicationSpec) {
    out.push_str(&format!("  server_name {};\n", app.dns.join(" ")));
    out.push_str(&format!("  root {};\n", app.project_path));
}

fn push_acme_location(out: &mut String) {
    out.push_str("  location ~ /\\.well-known/acme-challenge {\n");
    out.push_str("     allow all;\n");
    out.push_str("  }\n");
}

fn push_proxy_location(out: &mut String, app: &ApplicationSpec) {
    out.push_str("  location / {\n");
    out.push_str(&format!("     proxy_pass {};\n", app.proxy_pass));
    out.push_str("     proxy_redirect     off;\n");
    out.push_str("     proxy_set_header   Host $host;\n");
    out.push_str("     proxy_set_header   X-Real-IP $remote_addr;\n");
    out.push_str("     proxy_set_header   X-Forwarded-For $proxy_add_x_forwarded_for;\n");
    out.push_str("     proxy_set_header   X-Forwarded-Proto $scheme;\n");
    out.push_str("     proxy_set_header   X-Forwarded-Host $server_name;\n");
    out.push_str("  }\n");
}

// The provisioning document compiled into the binary. It is used when neither
// `--config`, `SETUP_REXON_CONFIG` nor `~/.setup-rexon/provision.yaml` supplies
// one, and `setup-rexon generate` writes it out as a starting point.
//
// Required: base packages, Node.js, git and the Rexon application itself.
// Optional: the systemd unit (Linux with systemd only), the nginx reverse
// proxy and the tunnel agent, the last two behind interactive choices.

pub const BUILTIN_CONFIG: &str = r#"# setup-rexon provisioning document
#
# Capabilities are what the run must achieve; actions are how, per OS family.
# Placeholders: {{install_dir}}, {{os_family}}, {{arch}}, {{package_manager}}
# and any choice name below, e.g. {{node_version}}.

choices:
  - name: node_version
    prompt: Node.js major version
    allowed: ["18", "20", "22"]
    default: "20"
  - name: reverse_proxy
    prompt: Configure an nginx reverse proxy for Rexon?
    allowed: ["yes", "no"]
    default: "no"
  - name: tunnel
    prompt: Install the cloudflared tunnel agent?
    allowed: ["yes", "no"]
    default: "no"

probe_tools:
  - name: nginx
    version_args: ["-v"]

capabilities:
  - kind: runtime_present
    name: node
    min_version: "18"
    actions: [install-node]
  - kind: runtime_present
    name: git
    min_version: any
    actions: [install-git]
  - kind: service_configured
    name: rexon
    actions: [install-rexon]
  - kind: service_configured
    name: rexon_service
    actions: [install-service]
    optional: true
  - kind: service_configured
    name: reverse_proxy
    actions: [configure-proxy]
    gated_by: reverse_proxy
  - kind: service_configured
    name: tunnel
    actions: [install-tunnel]
    gated_by: tunnel

actions:
  - id: base-packages
    description: Install curl and CA certificates
    provides:
      tool: curl
    requires_privilege: true
    timeout_secs: 600
    variants:
      debian:
        program: sh
        args: ["-c", "apt-get update && apt-get install -y curl ca-certificates"]
        env:
          DEBIAN_FRONTEND: noninteractive
      rhel:
        program: "{{package_manager}}"
        args: [install, -y, curl, ca-certificates]
      alpine:
        program: apk
        args: [add, --no-cache, curl, ca-certificates]
      macos:
        program: brew
        args: [install, curl]
      termux:
        program: pkg
        args: [install, -y, curl]

  - id: install-node
    description: Install Node.js {{node_version}}
    provides:
      tool: node
    requires_privilege: true
    depends_on: [base-packages]
    timeout_secs: 900
    variants:
      debian:
        program: sh
        args: ["-c", "curl -fsSL https://deb.nodesource.com/setup_{{node_version}}.x | bash - && apt-get install -y nodejs"]
      rhel:
        program: sh
        args: ["-c", "curl -fsSL https://rpm.nodesource.com/setup_{{node_version}}.x | bash - && {{package_manager}} install -y nodejs"]
      alpine:
        program: apk
        args: [add, --no-cache, nodejs, npm]
      macos:
        program: sh
        args: ["-c", "brew install node@{{node_version}} && brew link --overwrite --force node@{{node_version}}"]
      termux:
        program: pkg
        args: [install, -y, nodejs]

  - id: install-git
    description: Install git
    provides:
      tool: git
    requires_privilege: true
    depends_on: [base-packages]
    variants:
      debian:
        program: apt-get
        args: [install, -y, git]
        env:
          DEBIAN_FRONTEND: noninteractive
      rhel:
        program: "{{package_manager}}"
        args: [install, -y, git]
      alpine:
        program: apk
        args: [add, --no-cache, git]
      macos:
        program: brew
        args: [install, git]
      termux:
        program: pkg
        args: [install, -y, git]

  - id: install-rexon
    description: Install Rexon into {{install_dir}}
    creates: "{{install_dir}}/bin/rexon"
    depends_on: [install-node, install-git]
    timeout_secs: 900
    variants:
      any:
        program: npm
        args: [install, --global, --prefix, "{{install_dir}}", rexon]

  - id: install-service
    description: Register Rexon as a systemd service
    creates: /etc/systemd/system/rexon.service
    requires_privilege: true
    depends_on: [install-rexon]
    follow_up: "Start Rexon manually with {{install_dir}}/bin/rexon"
    artifacts:
      - path: "{{install_dir}}/rexon.service"
        template: |
          [Unit]
          Description=Rexon
          After=network-online.target

          [Service]
          ExecStart={{install_dir}}/bin/rexon
          WorkingDirectory={{install_dir}}
          Restart=on-failure

          [Install]
          WantedBy=multi-user.target
    variants:
      debian:
        program: sh
        args: ["-c", "install -m 644 {{install_dir}}/rexon.service /etc/systemd/system/rexon.service && systemctl daemon-reload && systemctl enable --now rexon"]
      rhel:
        program: sh
        args: ["-c", "install -m 644 {{install_dir}}/rexon.service /etc/systemd/system/rexon.service && systemctl daemon-reload && systemctl enable --now rexon"]
      alpine: unsupported
      macos: unsupported
      termux: unsupported

  - id: install-nginx
    description: Install nginx
    provides:
      tool: nginx
    requires_privilege: true
    depends_on: [base-packages]
    variants:
      debian:
        program: apt-get
        args: [install, -y, nginx]
        env:
          DEBIAN_FRONTEND: noninteractive
      rhel:
        program: "{{package_manager}}"
        args: [install, -y, nginx]

  - id: configure-proxy
    description: Configure nginx to proxy to Rexon
    creates: /etc/nginx/conf.d/rexon.conf
    requires_privilege: true
    depends_on: [install-nginx]
    follow_up: "Copy {{install_dir}}/nginx/rexon.conf into your nginx configuration and reload nginx"
    artifacts:
      - path: "{{install_dir}}/nginx/rexon.conf"
        template: |
          server {
              listen 80;
              server_name _;

              location / {
                  proxy_pass http://127.0.0.1:3000;
                  proxy_http_version 1.1;
                  proxy_set_header Upgrade $http_upgrade;
                  proxy_set_header Connection "upgrade";
                  proxy_set_header Host $host;
              }
          }
    variants:
      debian:
        program: sh
        args: ["-c", "install -m 644 {{install_dir}}/nginx/rexon.conf /etc/nginx/conf.d/rexon.conf && nginx -t && (systemctl reload nginx || nginx -s reload)"]
      rhel:
        program: sh
        args: ["-c", "install -m 644 {{install_dir}}/nginx/rexon.conf /etc/nginx/conf.d/rexon.conf && nginx -t && (systemctl reload nginx || nginx -s reload)"]
      alpine: unsupported
      macos: unsupported
      termux: unsupported

  - id: install-tunnel
    description: Install the cloudflared tunnel agent
    provides:
      tool: cloudflared
    requires_privilege: true
    depends_on: [base-packages]
    timeout_secs: 300
    follow_up: "Run `cloudflared tunnel login`, then `cloudflared tunnel --url http://127.0.0.1:3000` to expose Rexon"
    variants:
      macos:
        program: brew
        args: [install, cloudflared]
      termux:
        program: pkg
        args: [install, -y, cloudflared]
      any:
        program: sh
        # Release assets use "arm" for 32-bit ARM and "386" for x86.
        args: ["-c", "case {{arch}} in armv7*|armhf) asset=arm ;; i386|i686) asset=386 ;; *) asset={{arch}} ;; esac && curl -fsSL -o /usr/local/bin/cloudflared https://github.com/cloudflare/cloudflared/releases/latest/download/cloudflared-linux-$asset && chmod +x /usr/local/bin/cloudflared"]
"#;

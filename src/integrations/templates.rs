//! Portuguese HTML bodies for the notification emails.

use super::mailer::Email;

pub const INVITE_RECEIVED: &str = "invite_received";
pub const INVITE_ANSWERED: &str = "invite_answered";
pub const REQUEST_RECEIVED: &str = "volunteer_request_received";
pub const REQUEST_ANSWERED: &str = "volunteer_request_answered";
pub const PASSWORD_RESET: &str = "password_reset";

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str, link: &str, link_label: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 560px; margin: 0 auto;\">\
         <h2 style=\"color: #2e7d32;\">{title}</h2>\
         {body}\
         <p><a href=\"{link}\" style=\"background: #2e7d32; color: #fff; padding: 10px 18px; \
         border-radius: 4px; text-decoration: none;\">{link_label}</a></p>\
         <p style=\"color: #888; font-size: 12px;\">Equipe Colabora</p>\
         </div>",
        title = escape(title),
        link = escape(link),
        link_label = escape(link_label),
    )
}

pub fn invite_received(
    frontend_url: &str,
    user_email: &str,
    user_name: &str,
    ong_name: &str,
) -> Email {
    let body = format!(
        "<p>Olá, {}!</p><p>A ONG <strong>{}</strong> convidou você para ser colaborador(a).</p>",
        escape(user_name),
        escape(ong_name)
    );
    Email {
        template: INVITE_RECEIVED,
        to_email: user_email.to_string(),
        to_name: Some(user_name.to_string()),
        subject: format!("{} convidou você para colaborar", ong_name),
        html: layout(
            "Novo convite",
            &body,
            &format!("{}/convites", frontend_url),
            "Ver convite",
        ),
    }
}

pub fn invite_answered(
    frontend_url: &str,
    ong_email: &str,
    ong_name: &str,
    user_name: &str,
    accepted: bool,
) -> Email {
    let verb = if accepted { "aceitou" } else { "recusou" };
    let body = format!(
        "<p>Olá, {}!</p><p><strong>{}</strong> {} o convite para colaborar com a sua ONG.</p>",
        escape(ong_name),
        escape(user_name),
        verb
    );
    Email {
        template: INVITE_ANSWERED,
        to_email: ong_email.to_string(),
        to_name: Some(ong_name.to_string()),
        subject: format!("{} {} o seu convite", user_name, verb),
        html: layout(
            "Convite respondido",
            &body,
            &format!("{}/convites", frontend_url),
            "Ver convites",
        ),
    }
}

pub fn request_received(
    frontend_url: &str,
    ong_email: &str,
    ong_name: &str,
    user_name: &str,
    project_name: &str,
) -> Email {
    let body = format!(
        "<p>Olá, {}!</p><p><strong>{}</strong> quer ser voluntário(a) no projeto <strong>{}</strong>.</p>",
        escape(ong_name),
        escape(user_name),
        escape(project_name)
    );
    Email {
        template: REQUEST_RECEIVED,
        to_email: ong_email.to_string(),
        to_name: Some(ong_name.to_string()),
        subject: format!("Nova solicitação de voluntariado em {}", project_name),
        html: layout(
            "Nova solicitação",
            &body,
            &format!("{}/solicitacoes", frontend_url),
            "Ver solicitações",
        ),
    }
}

pub fn request_answered(
    frontend_url: &str,
    user_email: &str,
    user_name: &str,
    project_name: &str,
    accepted: bool,
) -> Email {
    let outcome = if accepted { "aceita" } else { "recusada" };
    let body = format!(
        "<p>Olá, {}!</p><p>Sua solicitação para o projeto <strong>{}</strong> foi {}.</p>",
        escape(user_name),
        escape(project_name),
        outcome
    );
    Email {
        template: REQUEST_ANSWERED,
        to_email: user_email.to_string(),
        to_name: Some(user_name.to_string()),
        subject: format!("Sua solicitação para {} foi {}", project_name, outcome),
        html: layout(
            "Solicitação respondida",
            &body,
            &format!("{}/solicitacoes", frontend_url),
            "Ver solicitações",
        ),
    }
}

pub fn password_reset(
    frontend_url: &str,
    email: &str,
    name: &str,
    token: &str,
    expiry_mins: i64,
) -> Email {
    let body = format!(
        "<p>Olá, {}!</p><p>Recebemos um pedido para redefinir a sua senha. \
         O link abaixo expira em {} minutos.</p>\
         <p>Se você não fez este pedido, ignore este email.</p>",
        escape(name),
        expiry_mins
    );
    Email {
        template: PASSWORD_RESET,
        to_email: email.to_string(),
        to_name: Some(name.to_string()),
        subject: "Redefinição de senha".to_string(),
        html: layout(
            "Redefinir senha",
            &body,
            &format!("{}/redefinir-senha?token={}", frontend_url, token),
            "Redefinir senha",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>Tom & \"Ana\"</b>"),
            "&lt;b&gt;Tom &amp; &quot;Ana&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_invite_received() {
        let email = invite_received("http://app", "ana@example.com", "Ana", "Mãos Dadas");
        assert_eq!(email.template, INVITE_RECEIVED);
        assert_eq!(email.to_email, "ana@example.com");
        assert!(email.subject.contains("Mãos Dadas"));
        assert!(email.html.contains("http://app/convites"));
    }

    #[test]
    fn test_answers_mention_outcome() {
        let accepted = invite_answered("http://app", "ong@example.com", "ONG", "Ana", true);
        assert!(accepted.html.contains("aceitou"));

        let rejected = request_answered("http://app", "ana@example.com", "Ana", "Horta", false);
        assert!(rejected.subject.contains("recusada"));
    }

    #[test]
    fn test_request_received_escapes_names() {
        let email = request_received("http://app", "ong@example.com", "ONG", "<script>", "Horta");
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_password_reset_link() {
        let email = password_reset("http://app", "ana@example.com", "Ana", "abc123", 60);
        assert!(email.html.contains("http://app/redefinir-senha?token=abc123"));
        assert!(email.html.contains("60 minutos"));
    }
}

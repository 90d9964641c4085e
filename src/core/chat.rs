//! 聊天助手
//!
//! 没有任何语言理解能力：按固定顺序对消息做子串匹配，
//! 命中第一条规则即返回对应的预设回复

use serde::{Deserialize, Serialize};

/// 助手名称
pub const ASSISTANT_NAME: &str = "Slavo";

/// 匹配规则：任一关键词命中即返回 `reply`
#[derive(Debug, Clone, Copy)]
pub struct ReplyRule {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub reply: &'static str,
}

/// 规则按顺序匹配，顺序即优先级
pub const RULES: &[ReplyRule] = &[
    ReplyRule {
        name: "accounts",
        keywords: &["account"],
        reply: "You can browse your Accounts from the sidebar. The list shows the 10 most recently created accounts with their industry and phone number. Click any account to see its related contacts, opportunities, cases and contracts.",
    },
    ReplyRule {
        name: "contacts",
        keywords: &["contact"],
        reply: "Contacts live under the Contacts tab. Open a contact to jump to its parent account or review its cases and opportunities. Use \"New\" to add a contact; Last Name is required.",
    },
    ReplyRule {
        name: "leads",
        keywords: &["lead"],
        reply: "To create a new lead, open the Leads tab and click \"New\". Last Name and Company are required; First Name and Email are optional.",
    },
    ReplyRule {
        name: "opportunities",
        keywords: &["opportunit"],
        reply: "Opportunities are listed under the Opportunities tab with their stage, amount and close date. Name, Stage and Close Date are required when creating one.",
    },
    ReplyRule {
        name: "cases",
        keywords: &["case"],
        reply: "Support cases are under the Cases tab. Each case has a subject, a status (New, Working, Escalated, Closed) and a priority (Low, Medium, High).",
    },
    ReplyRule {
        name: "contracts",
        keywords: &["contract"],
        reply: "Contracts are listed under the Contracts tab. A contract needs an Account ID, a start date and a term in months.",
    },
    ReplyRule {
        name: "reports",
        keywords: &["report"],
        reply: "The Home dashboard summarises record counts for accounts, contacts, leads and cases, plus your five most recent activities. Detailed reports are not available in this console yet.",
    },
    ReplyRule {
        name: "help",
        keywords: &["help"],
        reply: "I can point you to Accounts, Contacts, Leads, Opportunities, Cases and Contracts, and explain how to create or edit records. Try asking \"Show me my accounts\" or \"Create a new lead\".",
    },
    ReplyRule {
        name: "greeting",
        keywords: &["hello", "hey", "good morning", "good afternoon", "good evening"],
        reply: "Hello! I'm Slavo, your CRM assistant. Ask me about accounts, contacts, leads, opportunities, cases or contracts.",
    },
    ReplyRule {
        name: "thanks",
        keywords: &["thank"],
        reply: "You're welcome! Let me know if there is anything else I can help with.",
    },
];

/// 没有规则命中时的回复
pub const FALLBACK_REPLY: &str = "I'm not sure I understood that. I can help with accounts, contacts, leads, opportunities, cases, contracts and reports. Try asking \"Help\" to see what I can do.";

/// 前端传来的历史消息（只做计数，不参与回复）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sender: String,
}

/// 聊天请求
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "conversationHistory", default)]
    pub conversation_history: Vec<HistoryEntry>,
}

/// 匹配结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatReply {
    /// 命中的规则名，未命中时为 `None`
    pub rule: Option<&'static str>,
    pub text: &'static str,
}

/// 为消息挑选预设回复
pub fn reply_to(message: &str) -> ChatReply {
    let normalized = message.to_lowercase();

    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| normalized.contains(kw)))
        .map(|rule| ChatReply {
            rule: Some(rule.name),
            text: rule.reply,
        })
        .unwrap_or(ChatReply {
            rule: None,
            text: FALLBACK_REPLY,
        })
}
